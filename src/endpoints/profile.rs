use axum::{extract::State, routing::patch, Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::permissions::Authenticated;
use crate::services::security::verify_password;
use crate::services::users;
use crate::state::AppState;

/// Create profile routes (current user only)
pub fn profile_routes(state: AppState) -> Router {
    Router::new()
        .route("/password", patch(change_own_password))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Change the caller's own password
#[utoipa::path(
    patch,
    path = "/api/profile/password",
    tag = "Profile",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = serde_json::Value)
    )
)]
pub async fn change_own_password(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;

    if !verify_password(&request.current_password, &current.password_hash) {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    users::set_password(&state.db, &state.config.auth, &current.id, &request.new_password).await?;
    tracing::info!("User {} changed their password", current.email);

    Ok(Json(serde_json::json!({ "success": true })))
}
