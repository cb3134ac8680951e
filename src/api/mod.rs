mod error;
mod sessions;
mod users;

use axum::Router;
use std::sync::Arc;
use url::Url;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::mailer::Mailer;
use crate::rate_limit::RateLimitConfig;

pub use sessions::SessionsState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    mailer: Mailer,
    secure_cookies: bool,
    app_origin: Url,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        mailer: mailer.clone(),
        secure_cookies,
        rate_limits,
    };

    let users_state = users::UsersState {
        db,
        jwt,
        mailer,
        app_origin,
    };

    Router::new()
        .merge(sessions::router(sessions_state))
        .merge(users::router(users_state))
}
