//! Client-side session lifecycle.
//!
//! A storefront client holds the short-lived access token in memory (never a
//! cookie), mirrors it to durable storage so a restart can rehydrate the
//! session, and watches the token's expiry so it can renew through the
//! refresh endpoint before the user notices. Nothing here is trusted by the
//! server: every protected call is still independently verified server-side.

mod cache;
mod tracker;

pub use cache::{SessionCache, SessionUser, StoredSession};
pub use tracker::{
    HttpRefreshTransport, RefreshError, RefreshTransport, SessionState, SessionTracker,
    WARN_BEFORE_EXPIRY_SECS, decode_expiry,
};
