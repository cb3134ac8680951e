#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use futures::future::BoxFuture;
use loomfront::db::Database;
use loomfront::mailer::{Mail, MailError, MailSink, Mailer};
use loomfront::rate_limit::RateLimitConfig;
use loomfront::{ServerConfig, create_app};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use url::Url;

pub const ACCESS_SECRET: &[u8] = b"access-secret-long-enough-for-tests!";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-long-enough-for-tests";

/// Mail sink that records deliveries (or fails them all) instead of
/// talking to a provider.
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<Mail>>>,
    fail: bool,
}

impl MailSink for RecordingSink {
    fn deliver(&self, mail: Mail) -> BoxFuture<'static, Result<(), MailError>> {
        let delivered = self.delivered.clone();
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                return Err(MailError::Transport("recording sink set to fail".into()));
            }
            delivered.lock().unwrap().push(mail);
            Ok(())
        })
    }
}

pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub delivered: Arc<Mutex<Vec<Mail>>>,
}

pub async fn setup() -> TestContext {
    setup_with_failing_mail(false).await
}

pub async fn setup_with_failing_mail(fail_mail: bool) -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mailer = Mailer::new(Arc::new(RecordingSink {
        delivered: delivered.clone(),
        fail: fail_mail,
    }));

    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        refresh_token_ttl_secs: 7 * 24 * 60 * 60,
        secure_cookies: false, // Tests run over plain HTTP
        app_origin: Url::parse("http://localhost:3000").unwrap(),
        mailer,
        rate_limits: Arc::new(RateLimitConfig::permissive()),
    };

    TestContext {
        app: create_app(&config),
        db,
        delivered,
    }
}

impl TestContext {
    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Response<Body> {
        self.request(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_with_cookie(
        &self,
        path: &str,
        body: serde_json::Value,
        cookie: &str,
    ) -> Response<Body> {
        self.request(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn put_json_with_bearer(
        &self,
        path: &str,
        body: serde_json::Value,
        token: &str,
    ) -> Response<Body> {
        self.request(
            Request::put(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> Response<Body> {
        self.request(
            Request::get(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Sign up a user and return (response body, refresh cookie pair).
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        password: &str,
    ) -> (serde_json::Value, String) {
        let response = self
            .post_json(
                "/api/signup",
                serde_json::json!({
                    "name": name, "email": email, "phone": phone, "password": password
                }),
            )
            .await;
        assert_eq!(response.status(), 201, "signup should succeed");

        let cookie = refresh_cookie_pair(&response).expect("signup must set a refresh cookie");
        (body_json(response).await, cookie)
    }

    /// Wait for the fire-and-forget mail tasks to drain.
    pub async fn wait_for_mail(&self, count: usize) {
        for _ in 0..200 {
            if self.delivered.lock().unwrap().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} delivered mails, got {}",
            count,
            self.delivered.lock().unwrap().len()
        );
    }

    pub fn delivered_mails(&self) -> Vec<Mail> {
        self.delivered.lock().unwrap().clone()
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// All Set-Cookie header values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect()
}

/// The full Set-Cookie attribute string for the refresh cookie, if set.
pub fn refresh_set_cookie(response: &Response<Body>) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with("refreshToken="))
}

/// The `refreshToken=<value>` pair suitable for a Cookie request header.
pub fn refresh_cookie_pair(response: &Response<Body>) -> Option<String> {
    refresh_set_cookie(response)
        .and_then(|c| c.split(';').next().map(str::to_string))
}
