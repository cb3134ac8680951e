//! Transactional mail dispatch.
//!
//! Notifications are strictly best-effort: `Mailer::send` hands the message
//! to a background task and returns immediately. Delivery failures are
//! logged and never surfaced to the request that triggered them, so a mail
//! outage cannot fail or delay signup or login.
//!
//! Delivery goes through a `MailSink`, normally the HTTP API of a mail
//! provider; tests substitute recording or failing sinks.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, info};
use url::Url;

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Mail {
    /// Welcome mail sent after signup.
    pub fn welcome(name: &str, email: &str, phone: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Welcome to Loomfront!".to_string(),
            html: format!(
                "<p>Welcome, {name}!</p>\
                 <p>Thank you for signing up. Your account details:</p>\
                 <ul><li>Name: {name}</li><li>Email: {email}</li><li>Phone: {phone}</li></ul>\
                 <p>Happy shopping!</p>\
                 <small>If you did not sign up, please ignore this email.</small>"
            ),
        }
    }

    /// Login notification mail.
    pub fn login_alert(name: &str, email: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Login Notification - Loomfront".to_string(),
            html: format!(
                "<p>Hello, {name}!</p>\
                 <p>Your account ({email}) was just used to sign in.</p>\
                 <p>If this wasn't you, please reset your password immediately.</p>"
            ),
        }
    }

    /// Password-reset mail with the reset link.
    pub fn password_reset(name: &str, email: &str, link: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Password Reset - Loomfront".to_string(),
            html: format!(
                "<p>Hello, {name}!</p>\
                 <p>A password reset was requested for your account. The link below is \
                 valid for one hour:</p>\
                 <p><a href=\"{link}\">{link}</a></p>\
                 <small>If you did not request a reset, you can ignore this email.</small>"
            ),
        }
    }
}

/// Delivery failure.
#[derive(Debug)]
pub enum MailError {
    /// Transport-level failure
    Transport(String),
    /// Provider rejected the message
    Rejected(u16),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Transport(e) => write!(f, "Mail transport error: {}", e),
            MailError::Rejected(status) => write!(f, "Mail provider rejected message: {}", status),
        }
    }
}

impl std::error::Error for MailError {}

/// Delivery backend for the mailer.
pub trait MailSink: Send + Sync + 'static {
    fn deliver(&self, mail: Mail) -> BoxFuture<'static, Result<(), MailError>>;
}

/// Sink that posts messages to a mail provider's HTTP API.
pub struct HttpMailSink {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl HttpMailSink {
    pub fn new(endpoint: Url, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

impl MailSink for HttpMailSink {
    fn deliver(&self, mail: Mail) -> BoxFuture<'static, Result<(), MailError>> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": mail.to,
                "subject": mail.subject,
                "html": mail.html,
            }));

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(MailError::Rejected(response.status().as_u16()));
            }
            Ok(())
        })
    }
}

/// Fire-and-forget mail dispatcher.
///
/// Cloneable handle constructed once at startup and injected into the
/// handlers that send notifications.
#[derive(Clone)]
pub struct Mailer {
    sink: Option<Arc<dyn MailSink>>,
}

impl Mailer {
    /// A mailer with no delivery backend; messages are dropped with a debug log.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn new(sink: Arc<dyn MailSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Dispatch a message in the background. Never blocks, never fails the
    /// caller; the outcome is only logged.
    pub fn send(&self, mail: Mail) {
        let Some(sink) = self.sink.clone() else {
            debug!(to = %mail.to, subject = %mail.subject, "Mailer disabled, dropping mail");
            return;
        };

        tokio::spawn(async move {
            let to = mail.to.clone();
            let subject = mail.subject.clone();
            match sink.deliver(mail).await {
                Ok(()) => info!(to = %to, subject = %subject, "Mail delivered"),
                Err(e) => error!(to = %to, subject = %subject, error = %e, "Mail delivery failed"),
            }
        });
    }
}
