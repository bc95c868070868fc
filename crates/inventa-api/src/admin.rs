use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use inventa_db::models::LoginEventRow;
use inventa_types::api::{
    AdminUserSummary, AdminUsersResponse, DocumentListResponse, DocumentSummary, ExportData,
    ExportResponse, LoginEventDto, LoginHistoryResponse, LoginStats, MessageResponse, Stats,
    StatsResponse, UserSummary,
};
use inventa_types::time;

use crate::error::{ApiError, blocking};
use crate::extract::ApiQuery;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 100;
const MAX_HISTORY_LIMIT: u32 = 1000;

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let users = blocking(move || Ok(st.db.list_users()?)).await?;
    let users: Vec<AdminUserSummary> = users.into_iter().map(Into::into).collect();

    Ok(Json(AdminUsersResponse {
        success: true,
        count: users.len(),
        users,
    }))
}

/// GET /api/admin/documents — every document, newest first.
pub async fn list_documents(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let documents = blocking(move || {
        st.db
            .list_all_documents()?
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

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// GET /api/admin/login-history?limit=N
pub async fn login_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let st = state.clone();
    let history = blocking(move || {
        st.db
            .login_history(limit)?
            .into_iter()
            .map(|row| Ok(LoginEventDto::from(LoginEventRow::into_event(row)?)))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;

    Ok(Json(LoginHistoryResponse {
        success: true,
        count: history.len(),
        history,
    }))
}

/// GET /api/admin/export — users, documents and login history. No password
/// verifiers, wrapped keys or ciphertext are included.
pub async fn export_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let rows = blocking(move || Ok(st.db.export_all()?)).await?;

    info!(
        "Admin export: {} users, {} documents, {} login events",
        rows.users.len(),
        rows.documents.len(),
        rows.login_history.len()
    );

    Ok(Json(ExportResponse {
        success: true,
        data: ExportData {
            users: rows.users.into_iter().map(UserSummary::from).collect(),
            documents: rows.documents.into_iter().map(DocumentSummary::from).collect(),
            login_history: rows.login_history.into_iter().map(LoginEventDto::from).collect(),
            exported_at: time::now(),
        },
    }))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let st = state.clone();
    let row = blocking(move || Ok(st.db.stats(&today)?)).await?;

    Ok(Json(StatsResponse {
        success: true,
        stats: Stats {
            users: row.users,
            documents: row.documents,
            login_history: row.login_history,
            logins: LoginStats {
                total_logins: row.successful_logins + row.failed_logins,
                successful_logins: row.successful_logins,
                failed_logins: row.failed_logins,
                unique_users: row.unique_users,
                today_logins: row.today_logins,
            },
        },
    }))
}

/// DELETE /api/admin/data — wipes every table and ends all sessions.
pub async fn clear_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    blocking(move || Ok(st.db.clear_all()?)).await?;
    state.sessions.clear();

    warn!("Admin cleared all data");

    Ok(Json(MessageResponse {
        success: true,
        message: "All data cleared".into(),
    }))
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_is_clamped() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(50_000)), 1000);
    }
}
