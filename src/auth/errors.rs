//! Guard rejection type.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Rejection from the authorization guard. Both variants are 401: the
/// caller's remedy is the same either way (obtain a fresh access token).
/// The guard never clears cookies and never attempts a refresh itself.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token in the Authorization header
    MissingToken,
    /// Token present but malformed, mis-signed, or expired
    InvalidToken,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authentication required",
            AuthError::InvalidToken => "Invalid token",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
