use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::IntoResponse,
};
use tracing::{debug, info};

use inventa_crypto::{hash, sign};
use inventa_types::api::{OwnerSummary, VerifiedDocument, VerifyRequest, VerifyResponse};
use inventa_types::models::{Document, User};
use inventa_types::time;

use crate::documents::multipart_error;
use crate::error::{ApiError, blocking};
use crate::extract::ApiPath;
use crate::state::AppState;

/// What the caller handed us to verify.
enum VerifyInput {
    File(Bytes),
    Fingerprint(String),
}

/// Verification steps. A typed fingerprint skips straight to the lookup.
enum Verification {
    AwaitingInput(VerifyInput),
    ComputingFingerprint(Bytes),
    LookedUp {
        fingerprint: String,
        found: Option<(Document, User)>,
    },
}

impl Verification {
    fn step(self, state: &AppState) -> Result<Self, ApiError> {
        match self {
            Verification::AwaitingInput(VerifyInput::File(bytes)) => {
                Ok(Verification::ComputingFingerprint(bytes))
            }
            Verification::AwaitingInput(VerifyInput::Fingerprint(input)) => {
                let fingerprint = hash::normalize_fingerprint(&input).ok_or_else(|| {
                    ApiError::Validation("Hash must be 64 hexadecimal characters".into())
                })?;
                lookup(state, fingerprint)
            }
            Verification::ComputingFingerprint(bytes) => lookup(state, hash::fingerprint(&bytes)),
            done @ Verification::LookedUp { .. } => Ok(done),
        }
    }

    /// Drive to completion. Blocking: hashing and SQLite.
    fn run(mut self, state: &AppState) -> Result<VerifyResponse, ApiError> {
        loop {
            self = match self.step(state)? {
                Verification::LookedUp { fingerprint, found } => {
                    return Ok(into_response(fingerprint, found));
                }
                next => next,
            };
        }
    }
}

fn lookup(state: &AppState, fingerprint: String) -> Result<Verification, ApiError> {
    debug!("Verification lookup for {}", fingerprint);
    let found = match state.db.get_document_by_fingerprint(&fingerprint)? {
        None => None,
        Some(row) => {
            let document = row.into_document()?;
            let owner = state
                .db
                .get_user_by_id(&document.owner_id.to_string())?
                .ok_or(ApiError::NotFound("Document owner not found"))?
                .to_user()?;
            Some((document, owner))
        }
    };
    Ok(Verification::LookedUp { fingerprint, found })
}

fn into_response(fingerprint: String, found: Option<(Document, User)>) -> VerifyResponse {
    let Some((document, owner)) = found else {
        return VerifyResponse {
            success: true,
            verified: false,
            message: "Document not found in registry".into(),
            fingerprint,
            document: None,
            owner: None,
            signature_valid: None,
        };
    };

    let message = sign::registration_message(
        &document.fingerprint,
        &time::format(&document.created_at),
        &owner.id.to_string(),
    );
    let signature_valid = sign::verify(&message, &document.signature, &owner.public_key);

    VerifyResponse {
        success: true,
        verified: true,
        message: "Document verified successfully".into(),
        fingerprint,
        document: Some(VerifiedDocument {
            id: document.id,
            fingerprint: document.fingerprint,
            filename: document.filename,
            registered_at: document.created_at,
            signature: document.signature,
            metadata: document.metadata.into(),
        }),
        owner: Some(OwnerSummary {
            id: owner.id,
            username: owner.username,
            public_key: owner.public_key,
        }),
        signature_valid: Some(signature_valid),
    }
}

/// POST /api/verify — multipart (`file` or `hash`) or JSON `{"hash": ...}`.
pub async fn verify_document(
    State(state): State<AppState>,
    req: Request,
) -> Result<impl IntoResponse, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let input = if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        read_multipart_input(multipart).await?
    } else {
        let Json(body) = Json::<VerifyRequest>::from_request(req, &state)
            .await
            .map_err(|_| ApiError::Validation("No file or hash provided for verification".into()))?;
        Some(VerifyInput::Fingerprint(body.hash))
    };

    let input = input.ok_or_else(|| {
        ApiError::Validation("No file or hash provided for verification".into())
    })?;

    run_verification(state, input).await
}

/// GET /api/verify/{fingerprint}
pub async fn verify_fingerprint(
    State(state): State<AppState>,
    ApiPath(fingerprint): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    run_verification(state, VerifyInput::Fingerprint(fingerprint)).await
}

async fn run_verification(
    state: AppState,
    input: VerifyInput,
) -> Result<Json<VerifyResponse>, ApiError> {
    let st = state.clone();
    let response = blocking(move || Verification::AwaitingInput(input).run(&st)).await?;

    info!(
        "Verification of {}: {}",
        response.fingerprint,
        if response.verified { "found" } else { "not found" }
    );
    Ok(Json(response))
}

/// A file wins over a typed hash when both are present.
async fn read_multipart_input(mut multipart: Multipart) -> Result<Option<VerifyInput>, ApiError> {
    let mut file = None;
    let mut typed = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let has_name = field.file_name().is_some_and(|n| !n.is_empty());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if has_name || !bytes.is_empty() {
                    file = Some(bytes);
                }
            }
            "hash" | "fingerprint" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    typed = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(file
        .map(VerifyInput::File)
        .or(typed.map(VerifyInput::Fingerprint)))
}
