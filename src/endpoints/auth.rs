use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::endpoints::ApiResponse;
use crate::error::{AppError, Result};
use crate::models::user;
use crate::services::security::{verify_password, SESSION_COOKIE_NAME};
use crate::services::users::find_by_email;
use crate::state::AppState;

/// Create auth routes for session management
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: user::Model,
}

// ============================================================================
// Session Cookie Helpers
// ============================================================================

/// Create a session cookie with the given token
fn create_session_cookie(token: &str, max_age: i64, secure: bool) -> HeaderValue {
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        max_age,
        if secure { "; Secure" } else { "" }
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Create a cookie that clears the session
fn clear_session_cookie() -> HeaderValue {
    let cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE_NAME
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

// ============================================================================
// Session Management Endpoints
// ============================================================================

/// Login with email and password; sets the session cookie and returns the token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 401, body = serde_json::Value)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    request.validate()?;

    let found_user = find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !verify_password(&request.password, &found_user.password_hash) {
        tracing::info!("Failed login attempt for {}", found_user.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = state.sessions.issue(&found_user)?;
    let cookie = create_session_cookie(
        &token,
        state.sessions.ttl_secs(),
        state.config.auth.secure_cookies,
    );

    tracing::info!("User {} logged in", found_user.email);

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok(LoginResponse {
            token,
            user: found_user,
        }),
    )
        .into_response())
}

/// Logout - clears the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}
