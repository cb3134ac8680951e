//! Durable session cache.
//!
//! The in-memory value is the single source of truth; the file is only a
//! mirror, reloaded at startup and rewritten on every mutation. A corrupt
//! or missing mirror is treated as "no session", never as an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// User identity fields the client holds, as decoded from the server's
/// auth response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// The locally cached session: identity plus the current access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user: SessionUser,
    pub access_token: String,
}

/// Owned session cache with explicit load/save/clear.
pub struct SessionCache {
    path: Option<PathBuf>,
    current: Option<StoredSession>,
}

impl SessionCache {
    /// Cache without a durable mirror (nothing survives a restart).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: None,
        }
    }

    /// Load the cache from a mirror file. Missing or unreadable mirrors
    /// yield an empty cache.
    pub fn load(path: PathBuf) -> Self {
        let current = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok());

        Self {
            path: Some(path),
            current,
        }
    }

    /// The currently held session, if any.
    pub fn session(&self) -> Option<&StoredSession> {
        self.current.as_ref()
    }

    /// The currently held access token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.access_token.as_str())
    }

    /// Replace the session (login/signup result) and rewrite the mirror.
    pub fn set(&mut self, session: StoredSession) {
        self.current = Some(session);
        self.save();
    }

    /// Replace only the access token after a successful refresh.
    /// Returns false (and does nothing) when no session is held — a stale
    /// refresh result must not resurrect a cleared session.
    pub fn set_access_token(&mut self, token: String) -> bool {
        match self.current.as_mut() {
            Some(session) => {
                session.access_token = token;
                self.save();
                true
            }
            None => false,
        }
    }

    /// Drop the session and remove the mirror.
    pub fn clear(&mut self) {
        self.current = None;
        if let Some(path) = &self.path {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove session mirror");
                }
            }
        }
    }

    fn save(&self) {
        let (Some(path), Some(session)) = (&self.path, &self.current) else {
            return;
        };
        match serde_json::to_vec(session) {
            Ok(bytes) => {
                if let Err(e) = fs::write(path, bytes) {
                    warn!(path = %path.display(), error = %e, "Failed to write session mirror");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session"),
        }
    }
}
