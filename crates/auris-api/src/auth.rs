use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use auris_db::Database;
use auris_types::api::{
    AuthResponse, Claims, LoginRequest, RegisterRequest, ResetSessionRequest, SessionResponse,
};

use crate::error::ApiError;
use crate::view::{account_view, now_rfc3339};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.chars().count() < 3 || req.username.chars().count() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".into(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id. Plaintext never reaches the store.
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();

    let account_id = Uuid::new_v4();
    let email = req.email.trim().to_lowercase();

    let inserted = state.db.create_account(
        &account_id.to_string(),
        req.username.trim(),
        &email,
        &password_hash,
        req.display_name.as_deref(),
        &now_rfc3339(),
    )?;
    if !inserted {
        return Err(ApiError::DuplicatePrincipal);
    }

    let row = state
        .db
        .get_account_by_id(&account_id.to_string())?
        .ok_or(ApiError::NotFound("account"))?;

    let token = create_token(&state.jwt_secret, account_id, &row.username)
        .map_err(ApiError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            account: account_view(&row),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    // Unknown email and wrong password take the same exit so callers cannot
    // enumerate which accounts exist.
    let row = state
        .db
        .get_account_by_email(&email)?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let account_id: Uuid = row
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt account id: {e}")))?;

    let token =
        create_token(&state.jwt_secret, account_id, &row.username).map_err(ApiError::Internal)?;

    Ok(Json(AuthResponse {
        account: account_view(&row),
        token,
    }))
}

/// Issue a fresh anonymous session identifier. Randomness comes from the OS
/// RNG via uuid v4; if that fails the request fails, never a weaker id.
pub async fn anonymous_session(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = Uuid::new_v4();
    state.db.create_session(&session_id.to_string(), &now_rfc3339())?;

    Ok((StatusCode::CREATED, Json(SessionResponse { session_id })))
}

/// Revoke the old identifier for future writes and hand out a new one.
/// Whispers created under the old id stay in the store, unreachable by
/// their author from now on.
pub async fn reset_session(
    State(state): State<AppState>,
    Json(req): Json<ResetSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.revoke_session(&req.old_session_id.to_string())?;

    let session_id = Uuid::new_v4();
    state.db.create_session(&session_id.to_string(), &now_rfc3339())?;

    Ok((StatusCode::CREATED, Json(SessionResponse { session_id })))
}

fn create_token(secret: &str, account_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: account_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
