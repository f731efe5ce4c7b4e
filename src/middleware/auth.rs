//! Authentication middleware for API routes
//!
//! Accepts the session token either as `Authorization: Bearer <token>` or as
//! the session cookie set by `/auth/login`.

use axum::{
    extract::{Request, State},
    http::{header, header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::EntityTrait;

use crate::models::prelude::*;
use crate::models::user;
use crate::services::security::SESSION_COOKIE_NAME;
use crate::state::AppState;

/// Authenticated user stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub user::Model);

/// Auth middleware that validates session tokens
///
/// Returns 401 Unauthorized if the token is missing, invalid, or belongs to
/// a user that no longer exists.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer_token(req.headers()).or_else(|| extract_session_token(req.headers())) {
        Some(t) => t,
        None => {
            return unauthorized_response("Authentication required");
        }
    };

    let user = match validate_token_and_get_user(&state, &token).await {
        Ok(u) => u,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    req.extensions_mut().insert(AuthenticatedUser(user));

    next.run(req).await
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.trim().to_string()).filter(|t| !t.is_empty())
}

/// Extract session token from cookie header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE_NAME)) {
            return Some(value.to_string()).filter(|v| !v.is_empty());
        }
    }
    None
}

/// Validate the session token and fetch the user it names
async fn validate_token_and_get_user(state: &AppState, token: &str) -> Result<user::Model, String> {
    let claims = state
        .sessions
        .verify(token)
        .map_err(|_| "Invalid or expired session".to_string())?;

    // The role is re-read from the database, not trusted from the token
    let found_user = User::find_by_id(claims.sub)
        .one(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load session user: {}", e);
            "Unable to verify session".to_string()
        })?;

    found_user.ok_or_else(|| "User no longer exists".to_string())
}

/// Create a 401 Unauthorized JSON response
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "success": false,
            "error": message
        })),
    )
        .into_response()
}
