use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::database::AppState;
use crate::error::AppError;
use crate::model::User;

/// The logged-in user, attached to the request by [`require_authenticated`]
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    pub token: String,
}

/// Bearer token from the `Authorization` header, if well-formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that resolves the session token into a [`Principal`]
///
/// Rejects with 401 when the token is missing, unknown or expired, or when
/// its user no longer exists, and with 403 when the account has been
/// deactivated since login.
pub async fn require_authenticated(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    let user_id = state.sessions.resolve(token).ok_or(AppError::Unauthorized)?;
    let user = state
        .db
        .get::<User>(user_id)?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active {
        debug!(user_id, "session of deactivated account rejected");
        return Err(AppError::Forbidden("Account is not active"));
    }

    let token = token.to_string();
    request.extensions_mut().insert(Principal { user, token });
    Ok(next.run(request).await)
}

/// Middleware that admits administrators only
///
/// Must run inside [`require_authenticated`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AppError::Unauthorized)?;

    if !principal.user.is_admin {
        return Err(AppError::Forbidden("Admin access required"));
    }

    Ok(next.run(request).await)
}
