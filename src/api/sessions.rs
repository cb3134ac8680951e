//! Session endpoints: signup, login, refresh.
//!
//! - POST `/signup` - Create an account and issue a token pair
//! - POST `/login` - Verify credentials and issue a token pair
//! - POST `/refresh` - Exchange the cookie-borne refresh token for a new
//!   access token
//!
//! The access token is returned in the response body only; the refresh
//! token is set only as an http-only cookie scoped to the refresh path.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::error::{ApiError, ResultExt};
use crate::auth::{REFRESH_COOKIE_NAME, get_cookie, refresh_cookie};
use crate::db::{Database, NewUser, UserProfile};
use crate::jwt::JwtConfig;
use crate::mailer::{Mail, Mailer};
use crate::password;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub mailer: Mailer,
    pub secure_cookies: bool,
    pub rate_limits: Arc<RateLimitConfig>,
}

pub fn router(state: SessionsState) -> Router {
    let signup_router = Router::new()
        .route("/signup", post(signup))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_signup,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_login,
        ));

    let refresh_router = Router::new()
        .route("/refresh", post(refresh))
        .with_state(state);

    Router::new()
        .merge(signup_router)
        .merge(login_router)
        .merge(refresh_router)
}

#[derive(Deserialize)]
struct SignupRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    message: String,
    access_token: String,
    user: UserProfile,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Register a new account and start a session.
async fn signup(
    State(state): State<SessionsState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();
    let phone = payload.phone.trim();
    let password = payload.password.as_str();

    if name.is_empty() || email.is_empty() || phone.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("All fields required"));
    }

    // Friendly pre-check; the UNIQUE constraint below still closes the race.
    let exists = state
        .db
        .users()
        .email_exists(email)
        .await
        .db_err("Failed to check email")?;
    if exists {
        return Err(ApiError::bad_request("Email already exists"));
    }

    let password_hash = password::hash_password(password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Server error")
    })?;

    let new_user = NewUser {
        user_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password_hash,
    };

    if let Err(e) = state.db.users().create(&new_user).await {
        if crate::db::UserStore::is_unique_violation(&e) {
            return Err(ApiError::bad_request("Email already exists"));
        }
        return Err(ApiError::db_error("Failed to create user", e));
    }

    let user = state
        .db
        .users()
        .get_by_user_id(&new_user.user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::internal("Server error"))?;

    let tokens = state
        .jwt
        .issue_tokens(&user.user_id, &user.email)
        .map_err(|e| {
            error!("Failed to issue tokens: {}", e);
            ApiError::internal("Server error")
        })?;

    // Best-effort; signup succeeds regardless of delivery.
    state
        .mailer
        .send(Mail::welcome(&user.name, &user.email, &user.phone));

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        tokens.refresh_duration,
        state.secure_cookies,
    );

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            access_token: tokens.access_token,
            user: UserProfile::from(&user),
        }),
    ))
}

/// Verify credentials and start a session.
///
/// Unknown email and wrong password produce an identical response, so the
/// endpoint leaks nothing about which accounts exist.
async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    let password = payload.password.as_str();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password required"));
    }

    let user = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to look up user")?;

    let user = match user {
        Some(user) if password::verify_password(password, &user.password_hash) => user,
        _ => return Err(ApiError::bad_request("Invalid credentials")),
    };

    let tokens = state
        .jwt
        .issue_tokens(&user.user_id, &user.email)
        .map_err(|e| {
            error!("Failed to issue tokens: {}", e);
            ApiError::internal("Server error")
        })?;

    state.mailer.send(Mail::login_alert(&user.name, &user.email));

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        tokens.refresh_duration,
        state.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Login successful".to_string(),
            access_token: tokens.access_token,
            user: UserProfile::from(&user),
        }),
    ))
}

/// Mint a new access token from the cookie-borne refresh token.
///
/// The refresh token is not rotated, and failures never set or clear
/// cookies — whether to drop local session state is the client's decision.
async fn refresh(
    State(state): State<SessionsState>,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, _body) = request.into_parts();

    let refresh_token = get_cookie(&parts.headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    let claims = state
        .jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| ApiError::forbidden("Invalid refresh token"))?;

    let access_token = state
        .jwt
        .issue_access_token(&claims.id, &claims.email)
        .map_err(|e| {
            error!("Failed to issue access token: {}", e);
            ApiError::internal("Server error")
        })?;

    Ok((StatusCode::OK, Json(RefreshResponse { access_token })))
}
