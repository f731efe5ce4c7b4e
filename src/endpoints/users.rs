use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::endpoints::ApiResponse;
use crate::error::Result;
use crate::middleware::permissions::{AdminManage, Authorized};
use crate::models::prelude::*;
use crate::models::user;
use crate::services::users::{self, NewUser};
use crate::state::AppState;

/// Create users routes
pub fn users_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{user_id}", patch(update_user).delete(delete_user))
        .route("/{user_id}/password", patch(reset_password))
        .route("/{user_id}/cf-accounts", put(replace_cf_accounts))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceBindingsRequest {
    pub cf_account_ids: Vec<String>,
}

/// A user together with the Cloudflare accounts bound to them
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: user::Model,
    pub cf_account_ids: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all users with their account bindings
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Users",
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>> {
    let all_users = users::list_users(&state.db).await?;

    let mut bindings: HashMap<String, Vec<String>> = HashMap::new();
    for binding in UserCfAccount::find().all(&state.db).await? {
        bindings
            .entry(binding.user_id)
            .or_default()
            .push(binding.cf_account_id);
    }

    let result = all_users
        .into_iter()
        .map(|u| UserResponse {
            cf_account_ids: bindings.remove(&u.id).unwrap_or_default(),
            user: u,
        })
        .collect();

    Ok(ApiResponse::ok(result))
}

/// Create a new user (role defaults to VIEWER)
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 409, body = serde_json::Value)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    request.validate()?;

    let created = users::create_user(
        &state.db,
        NewUser {
            email: request.email,
            password: request.password,
            name: request.name,
            role: request.role.unwrap_or(Role::Viewer),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(UserResponse {
            user: created,
            cf_account_ids: Vec::new(),
        }),
    ))
}

/// Change a user's role
#[utoipa::path(
    patch,
    path = "/api/admin/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: Authorized<AdminManage>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let updated = users::change_role(&state.db, &state.config.auth, &user_id, request.role).await?;
    tracing::info!(
        "{} changed role of {} to {}",
        auth.user().email,
        updated.email,
        updated.role
    );

    let cf_account_ids = users::bound_account_ids(&state.db, &updated.id).await?;
    Ok(ApiResponse::ok(UserResponse {
        user: updated,
        cf_account_ids,
    }))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/admin/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: Authorized<AdminManage>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    users::delete_user(&state.db, &state.config.auth, auth.user_id(), &user_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Reset another user's password
#[utoipa::path(
    patch,
    path = "/api/admin/users/{user_id}/password",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(user_id): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;
    users::set_password(&state.db, &state.config.auth, &user_id, &request.new_password).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Replace the set of Cloudflare accounts bound to a user
#[utoipa::path(
    put,
    path = "/api/admin/users/{user_id}/cf-accounts",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    request_body = ReplaceBindingsRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = serde_json::Value)
    )
)]
pub async fn replace_cf_accounts(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(user_id): Path<String>,
    Json(request): Json<ReplaceBindingsRequest>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let bound = users::replace_bindings(&state.db, &user_id, &request.cf_account_ids).await?;
    Ok(ApiResponse::ok(bound))
}
