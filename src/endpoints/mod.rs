pub mod audit;
pub mod auth;
pub mod cf_accounts;
pub mod cloudflare;
pub mod dns;
pub mod openapi;
pub mod profile;
pub mod users;
pub mod webhooks;

use axum::{middleware as axum_middleware, routing::get, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::require_auth;
use crate::models::user;
use crate::services::token_resolver::SessionUser;
use crate::state::AppState;

/// Success envelope shared by every JSON endpoint: `{success: true, result}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(result: T) -> Json<Self> {
        Json(Self {
            success: true,
            result,
        })
    }
}

/// Resolve the Cloudflare token `user` may use for `account_id`
pub(crate) async fn resolve_token(
    state: &AppState,
    account_id: Option<&str>,
    user: &user::Model,
) -> Result<String> {
    Ok(state
        .tokens
        .resolve(account_id, Some(&SessionUser::from(user)))
        .await?)
}

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/system/version", get(get_version).with_state(state.clone()))
        .route("/api/openapi.json", get(openapi::openapi_json))
        .nest("/auth", auth::auth_routes(state.clone()));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .nest("/api", api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    public_routes.merge(protected_routes)
}

/// API routes under /api/* (protected by auth middleware)
fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/admin/users", users::users_routes(state.clone()))
        .nest("/admin/cf-accounts", cf_accounts::cf_accounts_routes(state.clone()))
        .nest("/admin/audit-log", audit::audit_routes(state.clone()))
        .nest("/admin/webhooks", webhooks::webhooks_routes(state.clone()))
        .nest("/profile", profile::profile_routes(state.clone()))
        .nest("/cloudflare", cloudflare::cloudflare_routes(state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Version info endpoint
async fn get_version(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": state.config.version,
        "commit_hash": state.config.commit_hash,
        "build_time": state.config.build_time,
        "backend": "rust"
    }))
}
