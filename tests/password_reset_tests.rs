mod common;

use common::{body_json, setup};
use serde_json::json;
use sqlx::Row;

/// Pull the reset token straight from storage; in production it only
/// travels inside the mailed link.
async fn stored_reset_token(ctx: &common::TestContext, email: &str) -> Option<String> {
    sqlx::query("SELECT reset_token FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(ctx.db.pool())
        .await
        .unwrap()
        .get::<Option<String>, _>(0)
}

#[tokio::test]
async fn test_forgot_password_mints_token_and_mails_link() {
    let ctx = setup().await;
    ctx.signup("Ana", "ana@x.com", "123", "pw").await;
    ctx.wait_for_mail(1).await;

    let response = ctx
        .post_json("/api/forgot-password", json!({"email": "ana@x.com"}))
        .await;
    assert_eq!(response.status(), 200);

    let token = stored_reset_token(&ctx, "ana@x.com")
        .await
        .expect("reset token must be stored");

    ctx.wait_for_mail(2).await;
    let mails = ctx.delivered_mails();
    assert!(mails[1].subject.contains("Password Reset"));
    assert!(
        mails[1].html.contains(&token),
        "mail must carry the reset link"
    );
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let ctx = setup().await;
    ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    let known = ctx
        .post_json("/api/forgot-password", json!({"email": "ana@x.com"}))
        .await;
    let unknown = ctx
        .post_json("/api/forgot-password", json!({"email": "ghost@x.com"}))
        .await;

    assert_eq!(known.status(), 200);
    assert_eq!(unknown.status(), 200);
    assert_eq!(body_json(known).await, body_json(unknown).await);
}

#[tokio::test]
async fn test_reset_password_round_trip() {
    let ctx = setup().await;
    ctx.signup("Ana", "ana@x.com", "123", "old-pw").await;

    ctx.post_json("/api/forgot-password", json!({"email": "ana@x.com"}))
        .await;
    let token = stored_reset_token(&ctx, "ana@x.com").await.unwrap();

    let response = ctx
        .post_json(
            &format!("/api/reset-password/{}", token),
            json!({"password": "new-pw"}),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Old password no longer works, new one does
    let old = ctx
        .post_json("/api/login", json!({"email": "ana@x.com", "password": "old-pw"}))
        .await;
    assert_eq!(old.status(), 400);

    let new = ctx
        .post_json("/api/login", json!({"email": "ana@x.com", "password": "new-pw"}))
        .await;
    assert_eq!(new.status(), 200);

    // The token is single-use
    let reuse = ctx
        .post_json(
            &format!("/api/reset-password/{}", token),
            json!({"password": "sneaky"}),
        )
        .await;
    assert_eq!(reuse.status(), 400);
}

#[tokio::test]
async fn test_reset_password_with_bogus_token() {
    let ctx = setup().await;
    ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    let response = ctx
        .post_json("/api/reset-password/bogus-token", json!({"password": "new"}))
        .await;
    assert_eq!(response.status(), 400);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid or expired reset token");
}

#[tokio::test]
async fn test_reset_password_with_expired_token() {
    let ctx = setup().await;
    ctx.signup("Ana", "ana@x.com", "123", "pw").await;

    // Plant a token that expired long ago
    ctx.db
        .users()
        .set_reset_token("ana@x.com", "stale-token", 1_000)
        .await
        .unwrap();

    let response = ctx
        .post_json("/api/reset-password/stale-token", json!({"password": "new"}))
        .await;
    assert_eq!(response.status(), 400);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid or expired reset token");
}

#[tokio::test]
async fn test_reset_password_requires_password() {
    let ctx = setup().await;

    let response = ctx
        .post_json("/api/reset-password/some-token", json!({}))
        .await;
    assert_eq!(response.status(), 400);
}
