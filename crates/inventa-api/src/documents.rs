use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use inventa_crypto::encrypt::{self, SealedBox};
use inventa_crypto::{hash, keys, sign};
use inventa_db::models::{DocumentRow, EncryptedContent, NewDocument, RegisterOutcome};
use inventa_types::api::{
    DocumentListResponse, DocumentSummary, ExistingDocument, ProofResponse, UploadResponse,
};
use inventa_types::models::{Document, DocumentType, Proof, ProofOfWork, WorkType};
use inventa_types::time;

use crate::error::{ApiError, blocking};
use crate::extract::{ApiPath, ApiQuery};
use crate::sessions::Session;
use crate::state::AppState;

/// Extensions accepted for upload. Files without an extension are accepted too.
const ALLOWED_EXTENSIONS: &[&str] = &[
    // Documents
    "pdf", "doc", "docx", "txt", "rtf", "md", "odt",
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "svg", "webp",
    // Audio
    "mp3", "wav", "ogg", "flac", "aac",
    // Video
    "mp4", "avi", "mov", "mkv", "webm",
    // Archives
    "zip", "rar", "7z",
];

struct UploadedFile {
    filename: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    proof_of_work: Option<UploadedFile>,
    owner_name: Option<String>,
    description: Option<String>,
    document_type: Option<String>,
    work_type: Option<String>,
}

/// POST /api/upload — multipart upload. Fingerprints, encrypts and signs the
/// file, then registers it. The registry insert is the last step, so an
/// aborted request leaves nothing behind.
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_upload_form(multipart).await?;

    let file = form
        .file
        .ok_or_else(|| ApiError::Validation("No file provided".into()))?;
    if file.filename.trim().is_empty() {
        return Err(ApiError::Validation("No file selected".into()));
    }
    if !extension_allowed(&file.filename) {
        return Err(ApiError::Validation("File type not allowed".into()));
    }
    if file.bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    let document_type = match form.document_type.as_deref().map(str::trim) {
        None | Some("") => DocumentType::default(),
        Some(s) => s.parse().map_err(|e| ApiError::Validation(format!("{}", e)))?,
    };
    let work_type = match form.work_type.as_deref().map(str::trim) {
        None | Some("") => WorkType::default(),
        Some(s) => s.parse().map_err(|e| ApiError::Validation(format!("{}", e)))?,
    };
    let owner_name = form
        .owner_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| session.username.clone());
    let description = form.description.unwrap_or_default().trim().to_string();
    let filename = sanitize_filename(&file.filename);

    let st = state.clone();
    let owner_id = session.user_id;
    let document = blocking(move || {
        let fingerprint = hash::fingerprint(&file.bytes);

        // Fast path; the UNIQUE constraint below is what actually decides.
        if let Some(existing) = st.db.get_document_by_fingerprint(&fingerprint)? {
            return Err(duplicate_conflict(existing.into_document()?, owner_id));
        }

        let proof_of_work = form.proof_of_work.map(|pow| ProofOfWork {
            filename: sanitize_filename(&pow.filename),
            fingerprint: hash::fingerprint(&pow.bytes),
            size: pow.bytes.len() as u64,
        });

        // Per-document key, custodied by the owner: sealed under the
        // session's password-derived wrapping key.
        let document_key = keys::generate_document_key();
        let sealed = encrypt::encrypt(&document_key, &file.bytes)?;
        let wrapped_key = keys::wrap_document_key(&document_key, &session.keys.wrapping_key)?;

        let created_at = time::now();
        let registered_at = time::format(&created_at);
        let message = sign::registration_message(&fingerprint, &registered_at, &owner_id.to_string());
        let signature = sign::sign(&message, &session.keys.signing_key);

        let row = DocumentRow {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            filename,
            fingerprint,
            signature,
            file_size: file.bytes.len() as i64,
            owner_name,
            description,
            document_type: document_type.as_str().to_string(),
            work_type: work_type.as_str().to_string(),
            pow_filename: proof_of_work.as_ref().map(|p| p.filename.clone()),
            pow_fingerprint: proof_of_work.as_ref().map(|p| p.fingerprint.clone()),
            pow_size: proof_of_work.as_ref().map(|p| p.size as i64),
            created_at: registered_at,
        };

        let new_document = NewDocument {
            row,
            content: EncryptedContent {
                ciphertext: sealed.ciphertext,
                nonce: sealed.nonce.to_vec(),
                wrapped_key: wrapped_key.ciphertext,
                key_nonce: wrapped_key.nonce.to_vec(),
            },
        };

        match st.db.register_document(&new_document)? {
            RegisterOutcome::Inserted => Ok(new_document.row.into_document()?),
            RegisterOutcome::Duplicate(existing) => {
                Err(duplicate_conflict(existing.into_document()?, owner_id))
            }
        }
    })
    .await?;

    info!(
        "Document registered: {} ({}) by {}",
        document.id, document.fingerprint, document.owner_id
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            message: "Document registered successfully".into(),
            document: document.into(),
        }),
    ))
}

/// GET /api/documents — the caller's documents, newest first.
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let owner = session.user_id.to_string();
    let documents = blocking(move || {
        st.db
            .list_documents_by_owner(&owner)?
            .into_iter()
            .map(|row| Ok(DocumentSummary::from(row.into_document()?)))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;

    Ok(Json(DocumentListResponse {
        success: true,
        count: documents.len(),
        documents,
    }))
}

/// DELETE /api/documents/{document_id} — owner only.
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let owner_id = session.user_id;
    blocking(move || {
        let document = load_owned_document(&st, document_id, owner_id)?;
        if !st.db.delete_document(&document.id.to_string(), &owner_id.to_string())? {
            return Err(ApiError::NotFound("Document not found"));
        }
        Ok(())
    })
    .await?;

    info!("Document deleted: {} by {}", document_id, owner_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/documents/{document_id}/download — decrypts with the owner's
/// session key and streams back the original bytes.
pub async fn download_document(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(document_id): ApiPath<Uuid>,
) -> Result<Response, ApiError> {
    let st = state.clone();
    let owner_id = session.user_id;
    let (document, plaintext) = blocking(move || {
        let document = load_owned_document(&st, document_id, owner_id)?;
        let content = st
            .db
            .get_document_content(&document.id.to_string())?
            .ok_or(ApiError::NotFound("Document not found"))?;

        let wrapped_key = SealedBox::from_parts(content.wrapped_key, &content.key_nonce)?;
        let document_key = keys::unwrap_document_key(&wrapped_key, &session.keys.wrapping_key)?;
        let sealed = SealedBox::from_parts(content.ciphertext, &content.nonce)?;
        let plaintext = encrypt::decrypt(&document_key, &sealed)?;

        Ok((document, plaintext))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ),
        ],
        plaintext,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ProofQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// GET /api/proof/{document_id} — issue a freshly signed ownership proof.
/// `?format=text` returns the plain-text certificate instead of JSON.
pub async fn generate_proof(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(document_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ProofQuery>,
) -> Result<Response, ApiError> {
    let as_text = match query.format.as_deref() {
        None | Some("json") => false,
        Some("text") | Some("txt") => true,
        Some(other) => {
            return Err(ApiError::Validation(format!("Unknown proof format '{}'", other)));
        }
    };

    let st = state.clone();
    let owner_id = session.user_id;
    let proof = blocking(move || {
        let document = load_owned_document(&st, document_id, owner_id)?;
        let owner = st
            .db
            .get_user_by_id(&owner_id.to_string())?
            .ok_or(ApiError::NotFound("User not found"))?
            .to_user()?;

        let generated_at = time::now();
        let message = sign::proof_message(
            &document.fingerprint,
            &time::format(&document.created_at),
            &owner.id.to_string(),
            &time::format(&generated_at),
        );
        let proof_signature = sign::sign(&message, &session.keys.signing_key);

        Ok(Proof {
            document_id: document.id,
            fingerprint: document.fingerprint,
            filename: document.filename,
            owner_id: owner.id,
            owner_username: owner.username,
            owner_name: document.metadata.owner_name.clone(),
            owner_public_key: owner.public_key,
            registered_at: document.created_at,
            registration_signature: document.signature,
            generated_at,
            proof_signature,
            metadata: document.metadata,
        })
    })
    .await?;

    info!("Proof issued for document {}", proof.document_id);

    if as_text {
        let disposition = format!(
            "attachment; filename=\"inventa-proof-{}.txt\"",
            proof.document_id
        );
        return Ok((
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            proof.to_text(),
        )
            .into_response());
    }

    Ok(Json(ProofResponse {
        success: true,
        proof: proof.into(),
    })
    .into_response())
}

/// Fetch a document and check it belongs to `owner_id`.
fn load_owned_document(
    state: &AppState,
    document_id: Uuid,
    owner_id: Uuid,
) -> Result<Document, ApiError> {
    let document = state
        .db
        .get_document(&document_id.to_string())?
        .ok_or(ApiError::NotFound("Document not found"))?
        .into_document()?;

    if document.owner_id != owner_id {
        warn!(
            "User {} denied access to document {} owned by {}",
            owner_id, document.id, document.owner_id
        );
        return Err(ApiError::NotOwner);
    }
    Ok(document)
}

/// Same-owner and other-owner duplicates get different messages and codes.
fn duplicate_conflict(existing: Document, caller: Uuid) -> ApiError {
    let (message, code) = if existing.owner_id == caller {
        ("You have already registered this document", "already_registered_by_you")
    } else {
        (
            "This document has already been registered by another user",
            "already_registered_by_other",
        )
    };
    warn!(
        "Duplicate upload of {} by {} ({})",
        existing.fingerprint, caller, code
    );
    ApiError::Conflict {
        message: message.into(),
        code,
        existing: Some(ExistingDocument {
            id: existing.id,
            registered_at: existing.created_at,
            owner_id: existing.owner_id,
        }),
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "proofOfWork" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // An empty proof-of-work input is the same as none.
                if name == "proofOfWork" && filename.is_empty() {
                    continue;
                }
                let uploaded = UploadedFile { filename, bytes };
                if name == "file" {
                    form.file = Some(uploaded);
                } else {
                    form.proof_of_work = Some(uploaded);
                }
            }
            "ownerName" => form.owner_name = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = Some(field.text().await.map_err(multipart_error)?),
            "documentType" => {
                form.document_type = Some(field.text().await.map_err(multipart_error)?)
            }
            "workType" => form.work_type = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(form)
}

pub(crate) fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

fn extension_allowed(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        None => true,
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
    }
}

/// Strip any path and keep a conservative character set.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
