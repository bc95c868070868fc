//! Database row types — these map directly to SQLite rows.
//! Distinct from inventa-types models to keep the DB layer independent;
//! the `into_*` methods are the only place the two shapes meet.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use inventa_types::models::{
    Document, DocumentMetadata, LoginEvent, ProofOfWork, User,
};
use inventa_types::time;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub public_key: String,
    pub wrapped_private_key: Vec<u8>,
    pub private_key_nonce: Vec<u8>,
    pub key_salt: Vec<u8>,
    pub created_at: String,
}

impl UserRow {
    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id, "user id")?,
            username: self.username.clone(),
            email: self.email.clone(),
            public_key: self.public_key.clone(),
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// Document columns without the encrypted payload, which can be large and is
/// fetched separately through [`EncryptedContent`].
pub struct DocumentRow {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub fingerprint: String,
    pub signature: String,
    pub file_size: i64,
    pub owner_name: String,
    pub description: String,
    pub document_type: String,
    pub work_type: String,
    pub pow_filename: Option<String>,
    pub pow_fingerprint: Option<String>,
    pub pow_size: Option<i64>,
    pub created_at: String,
}

impl DocumentRow {
    pub fn into_document(self) -> Result<Document> {
        let proof_of_work = match (self.pow_filename, self.pow_fingerprint) {
            (Some(filename), Some(fingerprint)) => Some(ProofOfWork {
                filename,
                fingerprint,
                size: self.pow_size.unwrap_or(0).max(0) as u64,
            }),
            _ => None,
        };

        Ok(Document {
            id: parse_uuid(&self.id, "document id")?,
            owner_id: parse_uuid(&self.owner_id, "owner id")?,
            filename: self.filename,
            fingerprint: self.fingerprint,
            signature: self.signature,
            file_size: self.file_size.max(0) as u64,
            metadata: DocumentMetadata {
                owner_name: self.owner_name,
                description: self.description,
                document_type: self.document_type.parse().map_err(|e| anyhow!("{}", e))?,
                work_type: self.work_type.parse().map_err(|e| anyhow!("{}", e))?,
                proof_of_work,
            },
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// AES-GCM sealed document bytes plus the per-document key, itself sealed
/// under the owner's key-wrapping key.
pub struct EncryptedContent {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub key_nonce: Vec<u8>,
}

pub struct NewDocument {
    pub row: DocumentRow,
    pub content: EncryptedContent,
}

/// Result of an insert-if-absent on the fingerprint.
pub enum RegisterOutcome {
    Inserted,
    /// The fingerprint was already taken; carries the record that holds it.
    Duplicate(DocumentRow),
}

#[derive(Debug, PartialEq, Eq)]
pub enum UserInsert {
    Created,
    EmailTaken,
    UsernameTaken,
}

pub struct LoginEventRow {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
    pub action: String,
    pub outcome: String,
    pub fail_reason: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl LoginEventRow {
    pub fn from_event(event: &LoginEvent) -> Self {
        Self {
            id: event.id.to_string(),
            user_id: event.user_id.map(|id| id.to_string()),
            email: event.email.clone(),
            display_name: event.display_name.clone(),
            action: event.action.as_str().to_string(),
            outcome: event.outcome.as_str().to_string(),
            fail_reason: event.fail_reason.clone(),
            user_agent: event.user_agent.clone(),
            created_at: time::format(&event.created_at),
        }
    }

    pub fn into_event(self) -> Result<LoginEvent> {
        Ok(LoginEvent {
            id: parse_uuid(&self.id, "login event id")?,
            user_id: self
                .user_id
                .as_deref()
                .map(|id| parse_uuid(id, "login user id"))
                .transpose()?,
            email: self.email,
            display_name: self.display_name,
            action: self.action.parse().map_err(|e| anyhow!("{}", e))?,
            outcome: self.outcome.parse().map_err(|e| anyhow!("{}", e))?,
            fail_reason: self.fail_reason,
            user_agent: self.user_agent,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatsRow {
    pub users: u64,
    pub documents: u64,
    pub login_history: u64,
    pub successful_logins: u64,
    pub failed_logins: u64,
    pub unique_users: u64,
    pub today_logins: u64,
}

/// Everything except secrets, for the admin export.
pub struct ExportRows {
    pub users: Vec<User>,
    pub documents: Vec<Document>,
    pub login_history: Vec<LoginEvent>,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("Corrupt {} '{}'", what, s))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    time::parse(s).ok_or_else(|| anyhow!("Corrupt timestamp '{}'", s))
}
