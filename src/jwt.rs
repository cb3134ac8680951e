//! JWT token generation and validation.
//!
//! Dual-secret scheme: access tokens and refresh tokens are signed with
//! independent secrets, so a refresh token presented as an access token
//! (or vice versa) always fails signature verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access token duration: 15 minutes. Fixed policy.
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 7 days. Overridable via configuration.
pub const DEFAULT_REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// JWT claims for access tokens (short-lived, stateless).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Opaque user identifier (not a database row id)
    pub id: String,
    /// Account email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens (long-lived, cookie-borne).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Opaque user identifier
    pub id: String,
    /// Account email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Refresh token duration in seconds (drives the cookie Max-Age)
    pub refresh_duration: u64,
}

/// Configuration for JWT operations.
///
/// Holds both signing secrets and the refresh lifetime policy. Constructed
/// once at startup and shared read-only across handlers.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_duration: u64,
}

impl JwtConfig {
    /// Create a JWT configuration with the given secrets and the default
    /// refresh lifetime (7 days).
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_refresh_duration(
            access_secret,
            refresh_secret,
            DEFAULT_REFRESH_TOKEN_DURATION_SECS,
        )
    }

    /// Create a JWT configuration with an explicit refresh lifetime.
    pub fn with_refresh_duration(
        access_secret: &[u8],
        refresh_secret: &[u8],
        refresh_duration: u64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            refresh_duration,
        }
    }

    /// Mint an access/refresh token pair for an already-authenticated user.
    ///
    /// Performs no credential verification; callers must have validated the
    /// identity before asking for tokens.
    pub fn issue_tokens(&self, user_id: &str, email: &str) -> Result<TokenPair, JwtError> {
        let now = unix_now()?;

        let access_claims = AccessClaims {
            id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };
        let access_token =
            jsonwebtoken::encode(&Header::default(), &access_claims, &self.access_encoding)
                .map_err(JwtError::Encoding)?;

        let refresh_claims = RefreshClaims {
            id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.refresh_duration,
        };
        let refresh_token =
            jsonwebtoken::encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
                .map_err(JwtError::Encoding)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_duration: self.refresh_duration,
        })
    }

    /// Mint a new access token from verified refresh claims.
    /// Used by the refresh endpoint; the refresh token itself is not rotated.
    pub fn issue_access_token(&self, user_id: &str, email: &str) -> Result<String, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &validation)
                .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
                .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_duration(&self) -> u64 {
        self.refresh_duration
    }
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (malformed, bad signature, or expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new(b"access-secret-for-testing", b"refresh-secret-for-testing")
    }

    #[test]
    fn test_issue_and_validate_token_pair() {
        let config = test_config();

        let pair = config.issue_tokens("user-123", "ana@x.com").unwrap();
        assert_eq!(pair.refresh_duration, DEFAULT_REFRESH_TOKEN_DURATION_SECS);

        let access = config.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(access.id, "user-123");
        assert_eq!(access.email, "ana@x.com");
        assert_eq!(access.exp, access.iat + ACCESS_TOKEN_DURATION_SECS);

        let refresh = config.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.id, "user-123");
        assert_eq!(
            refresh.exp,
            refresh.iat + DEFAULT_REFRESH_TOKEN_DURATION_SECS
        );
    }

    #[test]
    fn test_cross_token_use_rejected() {
        let config = test_config();

        let pair = config.issue_tokens("user-123", "ana@x.com").unwrap();

        // Refresh token presented as access token fails (different secret)
        assert!(config.validate_access_token(&pair.refresh_token).is_err());

        // Access token presented as refresh token fails
        assert!(config.validate_refresh_token(&pair.access_token).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let config = test_config();

        assert!(config.validate_access_token("not-a-token").is_err());
        assert!(config.validate_refresh_token("not-a-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"access-secret-1", b"refresh-secret-1");
        let config2 = JwtConfig::new(b"access-secret-2", b"refresh-secret-2");

        let pair = config1.issue_tokens("user-123", "ana@x.com").unwrap();

        assert!(config2.validate_access_token(&pair.access_token).is_err());
        assert!(config2.validate_refresh_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_expired_access_token() {
        let secret = b"access-secret-for-testing";
        let encoding_key = EncodingKey::from_secret(secret);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = AccessClaims {
            id: "user-123".to_string(),
            email: "ana@x.com".to_string(),
            iat: now - 100,
            exp: now - 50, // Expired 50 seconds ago
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(secret, b"refresh-secret-for-testing");
        assert!(config.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_configured_refresh_duration() {
        let config = JwtConfig::with_refresh_duration(
            b"access-secret-for-testing",
            b"refresh-secret-for-testing",
            3600,
        );

        let pair = config.issue_tokens("user-123", "ana@x.com").unwrap();
        assert_eq!(pair.refresh_duration, 3600);

        let claims = config.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn test_issue_access_token_only() {
        let config = test_config();

        let token = config.issue_access_token("user-456", "bo@x.com").unwrap();
        let claims = config.validate_access_token(&token).unwrap();
        assert_eq!(claims.id, "user-456");
        assert_eq!(claims.exp, claims.iat + ACCESS_TOKEN_DURATION_SECS);
    }
}
