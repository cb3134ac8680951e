//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::mailer::{HttpMailSink, Mailer};
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Loomfront", about = "Storefront auth and session service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "loomfront.db")]
    pub database: String,

    /// Public origin of the storefront (full URL, e.g. "https://shop.example.com").
    /// Used to build password-reset links and to decide the cookie Secure flag.
    #[arg(long, default_value = "http://localhost:3000")]
    pub app_origin: String,

    /// Path to file containing the access-token secret. Prefer ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh-token secret. Prefer REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "7")]
    pub refresh_ttl_days: u64,

    /// Mail provider HTTP endpoint. Mail is disabled when absent
    #[arg(long, env = "MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    /// Sender address for transactional mail
    #[arg(long, default_value = "no-reply@loomfront.example")]
    pub mail_from: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load one token-signing secret from an environment variable or file.
///
/// Returns None and logs an error if the secret cannot be loaded or is too
/// short. A missing secret must stop startup: proceeding would sign every
/// token against an undefined key and quietly break all authentication.
fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking.
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use the matching --*-secret-file flag",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both token-signing secrets. Returns None if either is missing.
pub fn load_token_secrets(
    access_secret_file: Option<&str>,
    refresh_secret_file: Option<&str>,
) -> Option<(String, String)> {
    let access = load_secret("ACCESS_TOKEN_SECRET", access_secret_file)?;
    let refresh = load_secret("REFRESH_TOKEN_SECRET", refresh_secret_file)?;

    if access == refresh {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        return None;
    }

    Some((access, refresh))
}

/// Parse and validate the app-origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_app_origin(app_origin: &str) -> Option<Url> {
    let url = match Url::parse(app_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %app_origin, error = %e, "Invalid app-origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("app-origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build the mail dispatcher from CLI/env configuration.
/// Missing provider configuration disables mail rather than failing startup.
pub fn build_mailer(mail_api_url: Option<&str>, mail_from: &str) -> Mailer {
    let Some(endpoint) = mail_api_url else {
        warn!("MAIL_API_URL not set, transactional mail is disabled");
        return Mailer::disabled();
    };

    let endpoint = match Url::parse(endpoint) {
        Ok(url) => url,
        Err(e) => {
            warn!(url = %endpoint, error = %e, "Invalid MAIL_API_URL, transactional mail is disabled");
            return Mailer::disabled();
        }
    };

    let api_key = std::env::var("MAIL_API_KEY").unwrap_or_default();
    Mailer::new(Arc::new(HttpMailSink::new(
        endpoint,
        api_key,
        mail_from.to_string(),
    )))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    app_origin: Url,
    access_secret: String,
    refresh_secret: String,
    refresh_ttl_days: u64,
    mailer: Mailer,
) -> ServerConfig {
    let secure_cookies = app_origin.scheme() == "https";

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        refresh_token_ttl_secs: refresh_ttl_days * 24 * 60 * 60,
        secure_cookies,
        app_origin,
        mailer,
        rate_limits: Arc::new(RateLimitConfig::new()),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
