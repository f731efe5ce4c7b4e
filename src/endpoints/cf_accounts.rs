//! Cloudflare account credentials
//!
//! Tokens enter through this module only, are verified against Cloudflare
//! before they are stored, and never leave it again.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::endpoints::ApiResponse;
use crate::error::{AppError, Result};
use crate::middleware::permissions::{AdminManage, Authenticated, Authorized};
use crate::models::cf_account;
use crate::models::prelude::*;
use crate::services::permission_probe::{
    record_test_result, PermissionProber, ProbeReport, TestStatus,
};
use crate::services::token_resolver::TokenError;
use crate::services::users::bound_account_ids;
use crate::state::AppState;

/// Create Cloudflare account routes
pub fn cf_accounts_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/{account_id}", patch(update_account).delete(delete_account))
        .route("/{account_id}/test", post(test_account))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,
    pub token: Option<String>,
}

/// Permission test outcome, `{success: true, status, permissions, error?}`
#[derive(Debug, Serialize)]
pub struct TestAccountResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ProbeReport,
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_account(state: &AppState, account_id: &str) -> Result<cf_account::Model> {
    CfAccount::find_by_id(account_id.to_string())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::AccountNotFound("Cloudflare account not found".to_string()))
}

/// Verify a candidate token can list zones, then seal it for storage
async fn verify_and_encrypt(state: &AppState, token: &str) -> Result<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("Token is required".to_string()));
    }

    if let Err(e) = state.cloudflare.verify_token(token).await {
        let message = match e {
            AppError::Upstream(msg) => msg,
            other => other.to_string(),
        };
        return Err(AppError::BadRequest(format!("Invalid token: {}", message)));
    }

    Ok(state.tokens.cipher().encrypt(token)?)
}

// ============================================================================
// Handlers
// ============================================================================

/// List accounts: every account for ADMIN, bound accounts for VIEWER
#[utoipa::path(
    get,
    path = "/api/admin/cf-accounts",
    tag = "Cloudflare Accounts",
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
) -> Result<Json<ApiResponse<Vec<cf_account::Model>>>> {
    let mut query = CfAccount::find().order_by_asc(cf_account::Column::CreatedAt);

    if current.role != Role::Admin {
        let bound = bound_account_ids(&state.db, &current.id).await?;
        query = query.filter(cf_account::Column::Id.is_in(bound));
    }

    Ok(ApiResponse::ok(query.all(&state.db).await?))
}

/// Add an account; the token is checked against Cloudflare first
#[utoipa::path(
    post,
    path = "/api/admin/cf-accounts",
    tag = "Cloudflare Accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = serde_json::Value)
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<cf_account::Model>>)> {
    request.validate()?;
    let encrypted_token = verify_and_encrypt(&state, &request.token).await?;

    let account = cf_account::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(request.name.trim().to_string()),
        encrypted_token: Set(encrypted_token),
        created_at: Set(Utc::now()),
        last_test_at: Set(None),
        last_test_status: Set(None),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Added Cloudflare account {} ({})", account.name, account.id);
    Ok((StatusCode::CREATED, ApiResponse::ok(account)))
}

/// Rename an account and optionally rotate its token
#[utoipa::path(
    patch,
    path = "/api/admin/cf-accounts/{account_id}",
    tag = "Cloudflare Accounts",
    params(("account_id" = String, Path, description = "Account id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, body = serde_json::Value)
    )
)]
pub async fn update_account(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(account_id): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<cf_account::Model>>> {
    request.validate()?;
    let account = find_account(&state, &account_id).await?;
    let mut active: cf_account::ActiveModel = account.into();

    if let Some(name) = request.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(token) = request.token.filter(|t| !t.trim().is_empty()) {
        active.encrypted_token = Set(verify_and_encrypt(&state, &token).await?);
        // A new token invalidates the previous test verdict
        active.last_test_at = Set(None);
        active.last_test_status = Set(None);
    }

    Ok(ApiResponse::ok(active.update(&state.db).await?))
}

/// Delete an account; its user bindings go with it
#[utoipa::path(
    delete,
    path = "/api/admin/cf-accounts/{account_id}",
    tag = "Cloudflare Accounts",
    params(("account_id" = String, Path, description = "Account id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, body = serde_json::Value)
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(account_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let result = CfAccount::delete_by_id(account_id.clone())
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::AccountNotFound("Cloudflare account not found".to_string()));
    }

    tracing::info!("Deleted Cloudflare account {}", account_id);
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Probe the stored token's permissions and record the verdict
#[utoipa::path(
    post,
    path = "/api/admin/cf-accounts/{account_id}/test",
    tag = "Cloudflare Accounts",
    params(("account_id" = String, Path, description = "Account id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, body = serde_json::Value)
    )
)]
pub async fn test_account(
    State(state): State<AppState>,
    auth: Authorized<AdminManage>,
    Path(account_id): Path<String>,
) -> Result<Json<TestAccountResponse>> {
    // Existence is checked separately so an undecryptable token can be told
    // apart from a missing account
    find_account(&state, &account_id).await?;

    let report = match state
        .tokens
        .resolve(Some(&account_id), Some(&auth.session()))
        .await
    {
        Ok(token) => state.prober.test_account(&state.db, &account_id, &token).await?,
        Err(TokenError::AccountNotFound) => {
            record_test_result(&state.db, &account_id, TestStatus::Error).await?;
            ProbeReport {
                status: TestStatus::Error,
                permissions: vec![PermissionProber::cache_permission()],
                error: Some("Stored token could not be decrypted".to_string()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(TestAccountResponse {
        success: true,
        report,
    }))
}
