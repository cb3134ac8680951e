mod common;

use common::{body_json, refresh_set_cookie, setup};
use jsonwebtoken::{EncodingKey, Header};
use loomfront::jwt::{JwtConfig, RefreshClaims};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Sign a refresh token directly, bypassing the issuer, so tests can craft
/// expired or foreign tokens.
fn sign_refresh_token(secret: &[u8], id: &str, email: &str, iat: u64, exp: u64) -> String {
    let claims = RefreshClaims {
        id: id.to_string(),
        email: email.to_string(),
        iat,
        exp,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
}

#[tokio::test]
async fn test_refresh_with_valid_cookie() {
    let ctx = setup().await;
    let (signup_body, cookie) = ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    let response = ctx
        .post_json_with_cookie("/api/refresh", json!({}), &cookie)
        .await;
    assert_eq!(response.status(), 200);

    let body = body_json(response).await;
    let jwt = JwtConfig::new(common::ACCESS_SECRET, common::REFRESH_SECRET);
    let claims = jwt
        .validate_access_token(body["accessToken"].as_str().unwrap())
        .expect("refreshed access token must verify");

    assert_eq!(claims.email, "ana@x.com");
    assert_eq!(claims.id, signup_body["user"]["userId"].as_str().unwrap());
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let ctx = setup().await;

    let response = ctx.post_json("/api/refresh", json!({})).await;
    assert_eq!(response.status(), 401);

    let body = body_json(response).await;
    assert_eq!(body["error"], "No refresh token");
}

#[tokio::test]
async fn test_refresh_with_garbage_cookie() {
    let ctx = setup().await;

    let response = ctx
        .post_json_with_cookie("/api/refresh", json!({}), "refreshToken=not-a-jwt")
        .await;
    assert_eq!(response.status(), 403);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_refresh_with_expired_cookie() {
    let ctx = setup().await;

    let now = unix_now();
    let expired =
        sign_refresh_token(common::REFRESH_SECRET, "u-1", "ana@x.com", now - 1000, now - 10);

    let response = ctx
        .post_json_with_cookie(
            "/api/refresh",
            json!({}),
            &format!("refreshToken={}", expired),
        )
        .await;
    assert_eq!(response.status(), 403);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_refresh_rejects_access_token_in_cookie() {
    let ctx = setup().await;
    let (body, _cookie) = ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    // An access token smuggled into the refresh cookie is signed with the
    // wrong secret and must be rejected.
    let access_token = body["accessToken"].as_str().unwrap();
    let response = ctx
        .post_json_with_cookie(
            "/api/refresh",
            json!({}),
            &format!("refreshToken={}", access_token),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_refresh_is_idempotent_safe() {
    let ctx = setup().await;
    let (_body, cookie) = ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    // The refresh token is not single-use: two calls with the same valid
    // cookie both succeed and both tokens verify independently.
    let first = ctx
        .post_json_with_cookie("/api/refresh", json!({}), &cookie)
        .await;
    let second = ctx
        .post_json_with_cookie("/api/refresh", json!({}), &cookie)
        .await;
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);

    let jwt = JwtConfig::new(common::ACCESS_SECRET, common::REFRESH_SECRET);
    let token_a = body_json(first).await["accessToken"].as_str().unwrap().to_string();
    let token_b = body_json(second).await["accessToken"].as_str().unwrap().to_string();

    assert!(jwt.validate_access_token(&token_a).is_ok());
    assert!(jwt.validate_access_token(&token_b).is_ok());
}

#[tokio::test]
async fn test_refresh_failure_sets_no_cookies() {
    let ctx = setup().await;

    // Neither failure mode touches cookies; dropping local state is the
    // client's decision.
    let no_cookie = ctx.post_json("/api/refresh", json!({})).await;
    assert!(refresh_set_cookie(&no_cookie).is_none());

    let bad_cookie = ctx
        .post_json_with_cookie("/api/refresh", json!({}), "refreshToken=garbage")
        .await;
    assert!(refresh_set_cookie(&bad_cookie).is_none());
}

#[tokio::test]
async fn test_refresh_success_does_not_rotate_cookie() {
    let ctx = setup().await;
    let (_body, cookie) = ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    let response = ctx
        .post_json_with_cookie("/api/refresh", json!({}), &cookie)
        .await;
    assert_eq!(response.status(), 200);
    assert!(
        refresh_set_cookie(&response).is_none(),
        "the minimal flow mints a new access token only"
    );

    // The refresh token never appears in the response body either
    let body = body_json(response).await;
    let refresh_value = cookie.split_once('=').unwrap().1;
    assert!(!body.to_string().contains(refresh_value));
}
