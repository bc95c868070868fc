use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::time;

/// Public view of an account. Password verifier and key material never leave
/// the database layer through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

/// A registered document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub fingerprint: String,
    pub signature: String,
    pub file_size: u64,
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub owner_name: String,
    pub description: String,
    pub document_type: DocumentType,
    pub work_type: WorkType,
    pub proof_of_work: Option<ProofOfWork>,
}

/// Secondary file attached as evidence of the creative process. Only its
/// fingerprint is kept, not its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    pub filename: String,
    pub fingerprint: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentType {
    Pdf,
    Image,
    Audio,
    Video,
    Article,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Image => "image",
            DocumentType::Audio => "audio",
            DocumentType::Video => "video",
            DocumentType::Article => "article",
            DocumentType::Other => "other",
        }
    }
}

impl FromStr for DocumentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentType::Pdf),
            "image" => Ok(DocumentType::Image),
            "audio" => Ok(DocumentType::Audio),
            "video" => Ok(DocumentType::Video),
            "article" => Ok(DocumentType::Article),
            "other" => Ok(DocumentType::Other),
            _ => Err(UnknownVariant {
                kind: "document type",
                value: s.to_string(),
            }),
        }
    }
}

/// Whether the work was made by a person or generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkType {
    #[default]
    Human,
    Ai,
}

impl WorkType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkType::Human => "human",
            WorkType::Ai => "ai",
        }
    }
}

impl FromStr for WorkType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(WorkType::Human),
            "ai" => Ok(WorkType::Ai),
            _ => Err(UnknownVariant {
                kind: "work type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    Register,
    Login,
    Logout,
}

impl LoginAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginAction::Register => "register",
            LoginAction::Login => "login",
            LoginAction::Logout => "logout",
        }
    }
}

impl FromStr for LoginAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(LoginAction::Register),
            "login" => Ok(LoginAction::Login),
            "logout" => Ok(LoginAction::Logout),
            _ => Err(UnknownVariant {
                kind: "login action",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Failure => "failure",
        }
    }
}

impl FromStr for LoginOutcome {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LoginOutcome::Success),
            "failure" => Ok(LoginOutcome::Failure),
            _ => Err(UnknownVariant {
                kind: "login outcome",
                value: s.to_string(),
            }),
        }
    }
}

/// Append-only audit record of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub id: Uuid,
    /// `None` when the attempt named an email with no account.
    pub user_id: Option<Uuid>,
    pub email: String,
    pub display_name: Option<String>,
    pub action: LoginAction,
    pub outcome: LoginOutcome,
    pub fail_reason: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Signed ownership bundle. Each proof is signed fresh and carries its own
/// issuance time in `generated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub document_id: Uuid,
    pub fingerprint: String,
    pub filename: String,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub owner_name: String,
    pub owner_public_key: String,
    pub registered_at: DateTime<Utc>,
    pub registration_signature: String,
    pub generated_at: DateTime<Utc>,
    pub proof_signature: String,
    pub metadata: DocumentMetadata,
}

impl Proof {
    /// Plain-text certificate. One `Label: value` pair per line; values are
    /// written verbatim so other tools can parse them back out.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("INVENTA OWNERSHIP PROOF\n");
        out.push_str("=======================\n");
        let lines = [
            ("Document ID", self.document_id.to_string()),
            ("Filename", self.filename.clone()),
            ("Document Fingerprint", self.fingerprint.clone()),
            ("Owner ID", self.owner_id.to_string()),
            ("Owner Username", self.owner_username.clone()),
            ("Owner Name", self.owner_name.clone()),
            ("Owner Public Key", self.owner_public_key.clone()),
            ("Registration Signature", self.registration_signature.clone()),
            ("Registered At", time::format(&self.registered_at)),
            ("Proof Generated At", time::format(&self.generated_at)),
            ("Proof Signature", self.proof_signature.clone()),
            ("Document Type", self.metadata.document_type.as_str().to_string()),
            ("Work Type", self.metadata.work_type.as_str().to_string()),
        ];
        for (label, value) in lines {
            out.push_str(label);
            out.push_str(": ");
            out.push_str(&value);
            out.push('\n');
        }
        if let Some(pow) = &self.metadata.proof_of_work {
            out.push_str("Proof Of Work Fingerprint: ");
            out.push_str(&pow.fingerprint);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
