//! Webhook configuration
//!
//! Stored only; nothing dispatches to these endpoints yet.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::endpoints::ApiResponse;
use crate::error::{AppError, Result};
use crate::middleware::permissions::{AdminManage, Authorized};
use crate::models::audit_log::AuditAction;
use crate::models::prelude::*;
use crate::models::webhook;
use crate::state::AppState;

const MASKED_SECRET: &str = "****";

/// Create webhook routes
pub fn webhooks_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_webhooks).post(create_webhook))
        .route("/{webhook_id}", patch(update_webhook).delete(delete_webhook))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(url(message = "A valid URL is required"))]
    pub url: String,
    #[validate(length(min = 1, message = "At least one event is required"))]
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateWebhookRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(url(message = "A valid URL is required"))]
    pub url: Option<String>,
    #[validate(length(min = 1, message = "At least one event is required"))]
    pub events: Option<Vec<String>>,
    pub secret: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    /// Always masked when set
    pub secret: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<webhook::Model> for WebhookResponse {
    fn from(model: webhook::Model) -> Self {
        Self {
            events: model.event_list(),
            id: model.id,
            name: model.name,
            url: model.url,
            secret: model.secret.map(|_| MASKED_SECRET.to_string()),
            enabled: model.enabled,
            created_at: model.created_at,
        }
    }
}

/// Events must name audit actions so a future dispatcher can match them
fn encode_events(events: &[String]) -> Result<String> {
    if let Some(unknown) = events.iter().find(|e| AuditAction::parse(e).is_none()) {
        return Err(AppError::Validation(format!("Unknown event: {}", unknown)));
    }
    Ok(serde_json::to_string(events)?)
}

// ============================================================================
// Handlers
// ============================================================================

/// List webhooks, newest first
#[utoipa::path(
    get,
    path = "/api/admin/webhooks",
    tag = "Webhooks",
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_webhooks(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
) -> Result<Json<ApiResponse<Vec<WebhookResponse>>>> {
    let webhooks = Webhook::find()
        .order_by_desc(webhook::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok(
        webhooks.into_iter().map(WebhookResponse::from).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/webhooks",
    tag = "Webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = serde_json::Value)
    )
)]
pub async fn create_webhook(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Json(request): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WebhookResponse>>)> {
    request.validate()?;

    let created = webhook::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(request.name),
        url: Set(request.url),
        events: Set(encode_events(&request.events)?),
        secret: Set(request.secret.filter(|s| !s.is_empty())),
        enabled: Set(request.enabled.unwrap_or(true)),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(created.into())))
}

#[utoipa::path(
    patch,
    path = "/api/admin/webhooks/{webhook_id}",
    tag = "Webhooks",
    params(("webhook_id" = String, Path, description = "Webhook id")),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, body = serde_json::Value)
    )
)]
pub async fn update_webhook(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(webhook_id): Path<String>,
    Json(request): Json<UpdateWebhookRequest>,
) -> Result<Json<ApiResponse<WebhookResponse>>> {
    request.validate()?;

    let existing = Webhook::find_by_id(webhook_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Webhook not found".to_string()))?;
    let mut active: webhook::ActiveModel = existing.into();

    if let Some(name) = request.name {
        active.name = Set(name);
    }
    if let Some(url) = request.url {
        active.url = Set(url);
    }
    if let Some(events) = request.events {
        active.events = Set(encode_events(&events)?);
    }
    // An empty string clears the secret
    if let Some(secret) = request.secret {
        active.secret = Set(Some(secret).filter(|s| !s.is_empty()));
    }
    if let Some(enabled) = request.enabled {
        active.enabled = Set(enabled);
    }

    Ok(ApiResponse::ok(active.update(&state.db).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/admin/webhooks/{webhook_id}",
    tag = "Webhooks",
    params(("webhook_id" = String, Path, description = "Webhook id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, body = serde_json::Value)
    )
)]
pub async fn delete_webhook(
    State(state): State<AppState>,
    _auth: Authorized<AdminManage>,
    Path(webhook_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let result = Webhook::delete_by_id(webhook_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Webhook not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
