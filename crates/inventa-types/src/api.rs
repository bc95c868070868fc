//! Wire shapes for the HTTP API. Field names are camelCase on the wire; every
//! type here is built from a [`crate::models`] value through an explicit
//! `From` impl so the internal shape stays single and snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Document, DocumentMetadata, LoginEvent, Proof, ProofOfWork, User};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub public_key: String,
    #[serde(with = "crate::time::millis")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            public_key: user.public_key,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
    pub token: String,
    #[serde(with = "crate::time::millis")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub token: String,
    #[serde(with = "crate::time::millis")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// -- Documents --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfWorkDto {
    pub filename: String,
    pub fingerprint: String,
    pub size: u64,
}

impl From<ProofOfWork> for ProofOfWorkDto {
    fn from(pow: ProofOfWork) -> Self {
        Self {
            filename: pow.filename,
            fingerprint: pow.fingerprint,
            size: pow.size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadataDto {
    pub owner_name: String,
    pub description: String,
    pub document_type: String,
    pub work_type: String,
    pub proof_of_work: Option<ProofOfWorkDto>,
}

impl From<DocumentMetadata> for DocumentMetadataDto {
    fn from(meta: DocumentMetadata) -> Self {
        Self {
            owner_name: meta.owner_name,
            description: meta.description,
            document_type: meta.document_type.as_str().to_string(),
            work_type: meta.work_type.as_str().to_string(),
            proof_of_work: meta.proof_of_work.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub fingerprint: String,
    pub signature: String,
    pub file_size: u64,
    pub metadata: DocumentMetadataDto,
    #[serde(with = "crate::time::millis")]
    pub created_at: DateTime<Utc>,
}

impl From<Document> for DocumentSummary {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            owner_id: doc.owner_id,
            filename: doc.filename,
            fingerprint: doc.fingerprint,
            signature: doc.signature,
            file_size: doc.file_size,
            metadata: doc.metadata.into(),
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub document: DocumentSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<DocumentSummary>,
    pub count: usize,
}

/// Points a conflicting upload at the record that already holds the
/// fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingDocument {
    pub id: Uuid,
    #[serde(with = "crate::time::millis")]
    pub registered_at: DateTime<Utc>,
    pub owner_id: Uuid,
}

// -- Proofs --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDto {
    pub document_id: Uuid,
    pub fingerprint: String,
    pub filename: String,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub owner_name: String,
    pub owner_public_key: String,
    #[serde(with = "crate::time::millis")]
    pub registered_at: DateTime<Utc>,
    pub registration_signature: String,
    #[serde(with = "crate::time::millis")]
    pub generated_at: DateTime<Utc>,
    pub proof_signature: String,
    pub metadata: DocumentMetadataDto,
}

impl From<Proof> for ProofDto {
    fn from(proof: Proof) -> Self {
        Self {
            document_id: proof.document_id,
            fingerprint: proof.fingerprint,
            filename: proof.filename,
            owner_id: proof.owner_id,
            owner_username: proof.owner_username,
            owner_name: proof.owner_name,
            owner_public_key: proof.owner_public_key,
            registered_at: proof.registered_at,
            registration_signature: proof.registration_signature,
            generated_at: proof.generated_at,
            proof_signature: proof.proof_signature,
            metadata: proof.metadata.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProofResponse {
    pub success: bool,
    pub proof: ProofDto,
}

// -- Verification --

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "fingerprint")]
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDocument {
    pub id: Uuid,
    pub fingerprint: String,
    pub filename: String,
    #[serde(with = "crate::time::millis")]
    pub registered_at: DateTime<Utc>,
    pub signature: String,
    pub metadata: DocumentMetadataDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: Uuid,
    pub username: String,
    pub public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub verified: bool,
    pub message: String,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<VerifiedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_valid: Option<bool>,
}

// -- Admin --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "crate::time::millis")]
    pub created_at: DateTime<Utc>,
    pub has_public_key: bool,
}

impl From<User> for AdminUserSummary {
    fn from(user: User) -> Self {
        Self {
            has_public_key: !user.public_key.is_empty(),
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEventDto {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub display_name: Option<String>,
    pub action: String,
    pub outcome: String,
    pub fail_reason: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "crate::time::millis")]
    pub timestamp: DateTime<Utc>,
}

impl From<LoginEvent> for LoginEventDto {
    fn from(event: LoginEvent) -> Self {
        Self {
            id: event.id,
            user_id: event.user_id,
            email: event.email,
            display_name: event.display_name,
            action: event.action.as_str().to_string(),
            outcome: event.outcome.as_str().to_string(),
            fail_reason: event.fail_reason,
            user_agent: event.user_agent,
            timestamp: event.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminUsersResponse {
    pub success: bool,
    pub users: Vec<AdminUserSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginHistoryResponse {
    pub success: bool,
    pub history: Vec<LoginEventDto>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStats {
    pub total_logins: u64,
    pub successful_logins: u64,
    pub failed_logins: u64,
    pub unique_users: u64,
    pub today_logins: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub users: u64,
    pub documents: u64,
    pub login_history: u64,
    pub logins: LoginStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: Stats,
}

/// Bulk export. Carries no password verifiers, wrapped keys or ciphertext.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub users: Vec<UserSummary>,
    pub documents: Vec<DocumentSummary>,
    pub login_history: Vec<LoginEventDto>,
    #[serde(with = "crate::time::millis")]
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: ExportData,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_document: Option<ExistingDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time;
    use chrono::TimeZone;

    #[test]
    fn whole_second_timestamps_keep_their_millis() {
        let registered_at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 2).unwrap();
        let existing = ExistingDocument {
            id: Uuid::nil(),
            registered_at,
            owner_id: Uuid::nil(),
        };

        let json = serde_json::to_value(&existing).unwrap();
        assert_eq!(json["registeredAt"], "2026-10-19T08:15:02.000Z");
        assert_eq!(json["registeredAt"], time::format(&registered_at).as_str());

        let back: ExistingDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.registered_at, registered_at);
    }
}
