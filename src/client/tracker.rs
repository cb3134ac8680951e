//! Access-token expiry tracking and silent renewal.
//!
//! The tracker decodes the held token's expiry locally (the token is
//! self-describing; no server round-trip), schedules a one-shot timer for
//! one minute before expiry, and surfaces an "expiring" state with a
//! 1-second display tick. Renewal goes through the refresh endpoint; any
//! refresh failure is a hard logout — no retry loop, so a genuinely expired
//! session is never masked.
//!
//! Cancellation invariant: logging out, replacing the session, or dropping
//! the tracker aborts the pending timer, so a stale timer can never fire a
//! refresh for a cleared or superseded session.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::cache::{SessionCache, SessionUser, StoredSession};
use crate::auth::REFRESH_COOKIE_NAME;

/// Warning lead time: one minute before the access token expires.
pub const WARN_BEFORE_EXPIRY_SECS: u64 = 60;

/// Observable tracker state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session held; no timer scheduled.
    Idle,
    /// Session held, expiry not yet near.
    Active,
    /// Within the warning window. `remaining_secs` is display-only and
    /// updated on a 1-second tick; the tick never triggers a refresh.
    Expiring { remaining_secs: u64 },
}

/// Refresh failure, as seen by the tracker. The tracker's policy does not
/// distinguish the variants — any failure clears the session — but callers
/// may want them for logging.
#[derive(Debug)]
pub enum RefreshError {
    /// The server rejected the refresh token (expired, invalid, absent).
    Unauthorized,
    /// The refresh call did not complete.
    Network(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::Unauthorized => write!(f, "Refresh token rejected"),
            RefreshError::Network(e) => write!(f, "Refresh request failed: {}", e),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Transport used to call the refresh endpoint. Returns the new access
/// token on success.
pub trait RefreshTransport: Send + Sync + 'static {
    fn refresh(&self) -> BoxFuture<'static, Result<String, RefreshError>>;
}

/// Transport that POSTs to `/api/refresh` with the refresh cookie attached.
pub struct HttpRefreshTransport {
    client: reqwest::Client,
    refresh_url: Url,
    cookie: String,
}

impl HttpRefreshTransport {
    /// Build a transport against the given API origin, presenting the
    /// refresh token captured from the login/signup Set-Cookie response.
    pub fn new(api_origin: &Url, refresh_token: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            refresh_url: api_origin.join("/api/refresh")?,
            cookie: format!("{}={}", REFRESH_COOKIE_NAME, refresh_token),
        })
    }
}

impl RefreshTransport for HttpRefreshTransport {
    fn refresh(&self) -> BoxFuture<'static, Result<String, RefreshError>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshBody {
            access_token: String,
        }

        let request = self
            .client
            .post(self.refresh_url.clone())
            .header(reqwest::header::COOKIE, self.cookie.clone());

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| RefreshError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(RefreshError::Unauthorized);
            }

            let body: RefreshBody = response
                .json()
                .await
                .map_err(|e| RefreshError::Network(e.to_string()))?;
            Ok(body.access_token)
        })
    }
}

/// Decode the `exp` claim from a JWT without verifying it.
///
/// The client does not hold the signing secret; it only needs the expiry
/// for scheduling. The server still verifies every token it receives.
pub fn decode_expiry(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("exp")?.as_u64()
}

struct Inner {
    cache: Mutex<SessionCache>,
    transport: Arc<dyn RefreshTransport>,
    state: watch::Sender<SessionState>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Client session tracker.
///
/// Single-owner: dropping the tracker cancels any pending timer.
pub struct SessionTracker {
    inner: Arc<Inner>,
}

impl SessionTracker {
    /// Build a tracker over a (possibly rehydrated) cache. A session loaded
    /// from the mirror is scheduled immediately.
    pub fn new(cache: SessionCache, transport: Arc<dyn RefreshTransport>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let inner = Arc::new(Inner {
            cache: Mutex::new(cache),
            transport,
            state,
            timer: Mutex::new(None),
        });

        Self::schedule(&inner);
        Self { inner }
    }

    /// Subscribe to tracker state changes.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The cached user identity, if a session is held.
    pub fn user(&self) -> Option<SessionUser> {
        self.inner
            .cache
            .lock()
            .unwrap()
            .session()
            .map(|s| s.user.clone())
    }

    /// The currently held access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .cache
            .lock()
            .unwrap()
            .access_token()
            .map(String::from)
    }

    /// Install a new session (login/signup result), replacing any previous
    /// one and rescheduling the expiry timer.
    pub fn set_session(&self, session: StoredSession) {
        self.inner.cache.lock().unwrap().set(session);
        Self::schedule(&self.inner);
    }

    /// Renew the access token through the refresh endpoint.
    ///
    /// On success the held token and its mirror are replaced and the timer
    /// is rescheduled; returns true. On any failure all session state is
    /// cleared — the user is anonymous again — and false is returned. There
    /// is no retry.
    pub async fn renew(&self) -> bool {
        let result = self.inner.transport.refresh().await;

        match result {
            Ok(token) => {
                // A logout may have raced the in-flight refresh; if the
                // session is gone, the result must not resurrect it.
                let updated = self.inner.cache.lock().unwrap().set_access_token(token);
                if updated {
                    Self::schedule(&self.inner);
                    true
                } else {
                    debug!("Discarding refresh result for cleared session");
                    false
                }
            }
            Err(e) => {
                debug!(error = %e, "Refresh failed, clearing session");
                self.logout();
                false
            }
        }
    }

    /// Drop the session: cancel the pending timer, clear the cache and its
    /// mirror, return to idle.
    pub fn logout(&self) {
        Self::cancel_timer(&self.inner);
        self.inner.cache.lock().unwrap().clear();
        self.inner.state.send_replace(SessionState::Idle);
    }

    /// Whether a timer is currently scheduled. Exposed for tests.
    pub fn has_pending_timer(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn cancel_timer(inner: &Arc<Inner>) {
        if let Some(handle) = inner.timer.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// (Re)schedule the expiry timer from the currently held token.
    fn schedule(inner: &Arc<Inner>) {
        Self::cancel_timer(inner);

        let token = inner.cache.lock().unwrap().access_token().map(String::from);
        let Some(token) = token else {
            inner.state.send_replace(SessionState::Idle);
            return;
        };

        let Some(exp) = decode_expiry(&token) else {
            // Undecodable token: hold the session but schedule nothing; the
            // server will reject the token and the client re-authenticates.
            inner.state.send_replace(SessionState::Active);
            return;
        };

        let now = unix_now();
        let warn_at = exp.saturating_sub(WARN_BEFORE_EXPIRY_SECS);

        if now >= warn_at {
            inner.state.send_replace(SessionState::Expiring {
                remaining_secs: exp.saturating_sub(now),
            });
            let handle = tokio::spawn(tick_loop(inner.clone(), exp, now, Instant::now()));
            *inner.timer.lock().unwrap() = Some(handle);
            return;
        }

        inner.state.send_replace(SessionState::Active);

        let inner_task = inner.clone();
        let scheduled_unix = now;
        let scheduled_at = Instant::now();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(warn_at - now)).await;
            tick_loop(inner_task, exp, scheduled_unix, scheduled_at).await;
        });
        *inner.timer.lock().unwrap() = Some(handle);
    }
}

/// Display tick: once in the warning window, recompute the remaining time
/// every second until it reaches zero. Display only — never refreshes.
async fn tick_loop(inner: Arc<Inner>, exp: u64, scheduled_unix: u64, scheduled_at: Instant) {
    loop {
        let elapsed = scheduled_at.elapsed().as_secs();
        let remaining = exp.saturating_sub(scheduled_unix + elapsed);
        inner
            .state
            .send_replace(SessionState::Expiring {
                remaining_secs: remaining,
            });
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        Self::cancel_timer(&self.inner);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
