//! Axum extractors for the authorization guard.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use super::errors::AuthError;
use super::state::HasAuthBackend;
use crate::jwt::AccessClaims;

/// Pull the bearer token out of the Authorization header, if any.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Extractor for endpoints that require a valid access token.
///
/// A pure gate: verifies the bearer token's signature and expiry and hands
/// the decoded claims to the handler. It does not refresh expired tokens —
/// renewal is the client's job via the refresh endpoint.
pub struct AuthUser(pub AccessClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser(claims))
    }
}

/// Optional authentication extractor - never fails, returns Option<AccessClaims>.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct OptionalAuthUser(pub Option<AccessClaims>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(&parts.headers)
            .and_then(|token| state.jwt().validate_access_token(token).ok());
        Ok(OptionalAuthUser(claims))
    }
}
