use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use inventa_crypto::encrypt::SealedBox;
use inventa_crypto::keys;
use inventa_db::models::{LoginEventRow, UserInsert, UserRow};
use inventa_types::api::{
    AuthResponse, LoginRequest, MeResponse, MessageResponse, RefreshResponse, RegisterRequest,
    UserSummary,
};
use inventa_types::models::{LoginAction, LoginEvent, LoginOutcome};
use inventa_types::time;

use crate::error::{ApiError, blocking};
use crate::extract::ApiJson;
use crate::middleware::user_agent;
use crate::sessions::{Session, SessionKeys};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

/// Verifier checked against when the email is unknown, so both failure paths
/// pay for one Argon2 verification.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"inventa-unknown-account", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

/// POST /api/register — create the account, generate its signing key pair,
/// and open a session.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = validate_username(&req.username)?;
    let email = validate_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let agent = user_agent(&headers);

    let st = state.clone();
    let (row, session_keys) = blocking(move || {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
            .to_string();

        // Fresh key pair; the private half is only stored wrapped under a
        // key derived from the password.
        let pair = keys::generate_keypair()?;
        let key_salt = keys::generate_salt();
        let wrapping_key = keys::derive_wrapping_key(&req.password, &key_salt)?;
        let wrapped = keys::wrap_signing_key(&pair.signing_key, &wrapping_key)?;

        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password: password_hash,
            public_key: pair.public_key,
            wrapped_private_key: wrapped.ciphertext,
            private_key_nonce: wrapped.nonce.to_vec(),
            key_salt: key_salt.to_vec(),
            created_at: time::format(&time::now()),
        };

        match st.db.create_user(&row)? {
            UserInsert::Created => {}
            UserInsert::EmailTaken => {
                return Err(ApiError::conflict("Email already registered", "email_taken"));
            }
            UserInsert::UsernameTaken => {
                return Err(ApiError::conflict("Username already taken", "username_taken"));
            }
        }

        st.db.record_login(&login_event(
            Some(&row),
            &row.email,
            LoginAction::Register,
            LoginOutcome::Success,
            None,
            agent,
        ))?;

        Ok((
            row,
            SessionKeys {
                signing_key: pair.signing_key,
                wrapping_key,
            },
        ))
    })
    .await?;

    let user = row.to_user()?;
    let session = state
        .sessions
        .create(user.id, &user.username, &user.email, session_keys);

    info!("User registered: {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Registration successful".into(),
            user: user.into(),
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/login — every attempt is recorded in the login history,
/// with the specific failure reason kept server-side.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }
    let agent = user_agent(&headers);

    let st = state.clone();
    let (row, session_keys) = blocking(move || {
        let Some(row) = st.db.get_user_by_email(&email)? else {
            burn_password_check(&req.password);
            st.db.record_login(&login_event(
                None,
                &email,
                LoginAction::Login,
                LoginOutcome::Failure,
                Some("User not found"),
                agent,
            ))?;
            warn!("Login failed for unknown email");
            return Err(ApiError::InvalidCredentials);
        };

        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

        if Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            st.db.record_login(&login_event(
                Some(&row),
                &email,
                LoginAction::Login,
                LoginOutcome::Failure,
                Some("Invalid password"),
                agent,
            ))?;
            warn!("Login failed for user {}: invalid password", row.id);
            return Err(ApiError::InvalidCredentials);
        }

        // Unlock the signing key for the lifetime of the session.
        let wrapping_key = keys::derive_wrapping_key(&req.password, &row.key_salt)?;
        let sealed = SealedBox::from_parts(row.wrapped_private_key.clone(), &row.private_key_nonce)?;
        let signing_key = keys::unwrap_signing_key(&sealed, &wrapping_key)?;

        st.db.record_login(&login_event(
            Some(&row),
            &email,
            LoginAction::Login,
            LoginOutcome::Success,
            None,
            agent,
        ))?;

        Ok((
            row,
            SessionKeys {
                signing_key,
                wrapping_key,
            },
        ))
    })
    .await?;

    let user = row.to_user()?;
    let session = state
        .sessions
        .create(user.id, &user.username, &user.email, session_keys);

    info!("User logged in: {}", user.id);

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".into(),
        user: user.into(),
        token: session.token,
        expires_at: session.expires_at,
    }))
}

/// POST /api/logout — drops the session and its unlocked keys.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.remove(&session.token);

    let agent = user_agent(&headers);
    let st = state.clone();
    let event = LoginEventRow::from_event(&LoginEvent {
        id: Uuid::new_v4(),
        user_id: Some(session.user_id),
        email: session.email.clone(),
        display_name: Some(session.username.clone()),
        action: LoginAction::Logout,
        outcome: LoginOutcome::Success,
        fail_reason: None,
        user_agent: agent,
        created_at: time::now(),
    });
    blocking(move || Ok(st.db.record_login(&event)?)).await?;

    info!("User logged out: {}", session.user_id);

    Ok(Json(MessageResponse {
        success: true,
        message: "Logged out successfully".into(),
    }))
}

/// POST /api/refresh — extend the caller's session by a full TTL. The token
/// and the unlocked keys stay the same.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let refreshed = state
        .sessions
        .refresh(&session.token)
        .ok_or(ApiError::Unauthorized("Session expired or invalid"))?;

    info!("Session refreshed for user {}", refreshed.user_id);

    Ok(Json(RefreshResponse {
        success: true,
        token: refreshed.token,
        expires_at: refreshed.expires_at,
    }))
}

/// GET /api/me
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let uid = session.user_id.to_string();
    let row = blocking(move || Ok(st.db.get_user_by_id(&uid)?))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let user: UserSummary = row.to_user()?.into();
    Ok(Json(MeResponse {
        success: true,
        user,
    }))
}

fn burn_password_check(password: &str) -> bool {
    let Some(hash) = DUMMY_PASSWORD_HASH.as_deref() else {
        return false;
    };
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

fn login_event(
    user: Option<&UserRow>,
    email: &str,
    action: LoginAction,
    outcome: LoginOutcome,
    fail_reason: Option<&str>,
    user_agent: Option<String>,
) -> LoginEventRow {
    LoginEventRow {
        id: Uuid::new_v4().to_string(),
        user_id: user.map(|u| u.id.clone()),
        email: email.to_string(),
        display_name: user.map(|u| u.username.clone()),
        action: action.as_str().to_string(),
        outcome: outcome.as_str().to_string(),
        fail_reason: fail_reason.map(str::to_string),
        user_agent,
        created_at: time::format(&time::now()),
    }
}

/// Trim and check username shape. Case is preserved.
fn validate_username(username: &str) -> Result<String, ApiError> {
    let trimmed = username.trim();

    if trimmed.chars().count() < 3 || trimmed.chars().count() > 32 {
        return Err(ApiError::Validation("Username must be 3-32 characters".into()));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::Validation(
            "Username may contain only letters, digits, '.', '_' and '-'".into(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Trim, lowercase, and require a `local@domain` shape.
fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::Validation("A valid email address is required".into()));
    }
    Ok(email)
}
