pub mod admin;
pub mod auth;
pub mod config;
pub mod documents;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod sessions;
pub mod state;
pub mod verify;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;

/// Room for multipart boundaries and the text fields around the file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Inventa API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full `/api` router. Transport layers (CORS, tracing) are added
/// by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/verify", post(verify::verify_document))
        .route("/api/verify/{fingerprint}", get(verify::verify_fingerprint));

    let protected_routes = Router::new()
        .route("/api/logout", post(auth::logout))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/me", get(auth::me))
        .route("/api/upload", post(documents::upload_document))
        .route("/api/documents", get(documents::list_documents))
        .route("/api/documents/{document_id}", delete(documents::delete_document))
        .route(
            "/api/documents/{document_id}/download",
            get(documents::download_document),
        )
        .route("/api/proof/{document_id}", get(documents::generate_proof))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/documents", get(admin::list_documents))
        .route("/api/admin/login-history", get(admin::login_history))
        .route("/api/admin/export", get(admin::export_all))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/data", delete(admin::clear_all))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
