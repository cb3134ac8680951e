//! Account endpoints.
//!
//! - PUT `/user/profile` - Update profile fields (protected)
//! - POST `/forgot-password` - Mint a time-boxed reset token and mail a link
//! - POST `/reset-password/{token}` - Set a new password with a valid token
//! - GET `/users` - List accounts as public projections (protected)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;
use url::Url;

use super::error::{ApiError, ResultExt};
use crate::auth::AuthUser;
use crate::db::{Database, UserProfile};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::mailer::{Mail, Mailer};
use crate::password;

/// Reset tokens are valid for one hour.
const RESET_TOKEN_TTL_SECS: u64 = 60 * 60;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub mailer: Mailer,
    /// Public origin of the storefront, used to build reset links.
    pub app_origin: Url,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/user/profile", put(update_profile))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
        .route("/users", get(list_users))
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    phone: Option<String>,
    avatar: Option<String>,
}

#[derive(Serialize)]
struct ProfileResponse {
    message: String,
    user: UserProfile,
}

/// Update the authenticated user's profile. The identity comes from the
/// verified access token, never from the request body.
async fn update_profile(
    State(state): State<UsersState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.as_deref().map(str::trim);
    let phone = payload.phone.as_deref().map(str::trim);
    let avatar = payload.avatar.as_deref().map(str::trim);

    if name == Some("") || phone == Some("") {
        return Err(ApiError::bad_request("Fields cannot be empty"));
    }

    let user = state
        .db
        .users()
        .update_profile(&claims.id, name, phone, avatar)
        .await
        .db_err("Failed to update profile")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            message: "Profile updated".to_string(),
            user: UserProfile::from(&user),
        }),
    ))
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    #[serde(default)]
    email: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Start a password reset. The response is the same whether or not the
/// account exists, so the endpoint cannot be used for enumeration.
async fn forgot_password(
    State(state): State<UsersState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email required"));
    }

    let user = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to look up user")?;

    if let Some(user) = user {
        let token = generate_reset_token();
        let expires_at = unix_now()? + RESET_TOKEN_TTL_SECS;

        state
            .db
            .users()
            .set_reset_token(&user.email, &token, expires_at)
            .await
            .db_err("Failed to store reset token")?;

        let link = format!(
            "{}/reset-password/{}",
            state.app_origin.as_str().trim_end_matches('/'),
            token
        );
        state
            .mailer
            .send(Mail::password_reset(&user.name, &user.email, &link));
    }

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "If that account exists, a reset link has been sent".to_string(),
        }),
    ))
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    #[serde(default)]
    password: String,
}

/// Complete a password reset with a previously mailed token.
async fn reset_password(
    State(state): State<UsersState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password required"));
    }

    let user = state
        .db
        .users()
        .get_by_reset_token(&token, unix_now()?)
        .await
        .db_err("Failed to look up reset token")?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    let password_hash = password::hash_password(&payload.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Server error")
    })?;

    state
        .db
        .users()
        .set_password_hash(&user.user_id, &password_hash)
        .await
        .db_err("Failed to update password")?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated".to_string(),
        }),
    ))
}

#[derive(Serialize)]
struct ListUsersResponse {
    users: Vec<UserProfile>,
}

/// List accounts. Projections only: no password hashes, no reset tokens.
async fn list_users(
    State(state): State<UsersState>,
    AuthUser(_claims): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;

    Ok((StatusCode::OK, Json(ListUsersResponse { users })))
}

/// Random URL-safe reset token (32 bytes of entropy).
fn generate_reset_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn unix_now() -> Result<u64, ApiError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| ApiError::internal("Server error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_tokens_are_unique_and_url_safe() {
        let a = generate_reset_token();
        let b = generate_reset_token();

        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
