//! DNS record endpoints
//!
//! Every write runs the same pipeline: resolve the caller's token, pass the
//! protected-zone guard, call Cloudflare, then record the change in the audit
//! log. Nothing is audited unless Cloudflare accepted the change.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoints::resolve_token;
use crate::error::{AppError, Result};
use crate::middleware::permissions::{Authorized, CloudflareManage, CloudflareView};
use crate::models::audit_log::AuditAction;
use crate::models::user;
use crate::services::audit::AuditEntry;
use crate::services::cloudflare::{check_id, require_id, DnsRecordFilters};
use crate::state::AppState;

/// Create DNS routes (nested under `/api/cloudflare/dns`)
pub fn dns_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/{record_id}", put(update_record).delete(delete_record))
        .route("/batch", post(batch_delete))
        .route("/export", get(export_records))
        .route("/import", post(import_records))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Account and zone selection shared by the DNS routes
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ZoneQuery {
    /// Cloudflare account to act through; omitted means the fallback token
    pub account_id: Option<String>,
    pub zone_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListRecordsQuery {
    pub account_id: Option<String>,
    pub zone_id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub name: Option<String>,
    pub content: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "per_page")]
    pub per_page: Option<u32>,
    pub order: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListRecordsResponse {
    pub success: bool,
    pub records: Vec<Value>,
    pub total: u64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub zone_id: Option<String>,
    #[serde(default)]
    pub record_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchDeleteResponse {
    pub success: bool,
    pub deleted: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub zone_id: Option<String>,
    pub content: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn require_zone_id(zone_id: Option<String>) -> Result<String> {
    require_id(zone_id, "zoneId")
}

/// Record bodies may carry `zoneId` themselves; it wins over the query string
/// and is stripped before the body is forwarded.
fn split_zone_id(query_zone: Option<String>, mut body: Value) -> Result<(String, Value)> {
    let body_zone = body
        .as_object_mut()
        .and_then(|obj| obj.remove("zoneId"))
        .and_then(|v| v.as_str().map(String::from));
    Ok((require_zone_id(body_zone.or(query_zone))?, body))
}

/// Human-readable target for an audit entry, `TYPE name` when known
fn record_label(record: &Value, fallback: &str) -> String {
    let record_type = record.get("type").and_then(Value::as_str);
    let name = record.get("name").and_then(Value::as_str);
    match (record_type, name) {
        (Some(t), Some(n)) => format!("{} {}", t, n),
        (None, Some(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

fn audit_entry(
    actor: &user::Model,
    action: AuditAction,
    zone_id: &str,
    zone_name: Option<String>,
    target: String,
) -> AuditEntry {
    AuditEntry {
        user_id: actor.id.clone(),
        user_email: actor.email.clone(),
        action,
        zone_id: Some(zone_id.to_string()),
        zone_name,
        target: Some(target),
        before: None,
        after: None,
    }
}

/// Current state of a record before it is changed; absence is not an error
async fn snapshot(state: &AppState, token: &str, zone_id: &str, record_id: &str) -> Option<Value> {
    match state.cloudflare.get_dns_record(token, zone_id, record_id).await {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!("No snapshot of DNS record {}: {}", record_id, e);
            None
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List DNS records of a zone
#[utoipa::path(
    get,
    path = "/api/cloudflare/dns",
    tag = "DNS",
    params(ListRecordsQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<Json<ListRecordsResponse>> {
    let zone_id = require_zone_id(query.zone_id)?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;

    let filters = DnsRecordFilters {
        record_type: query.record_type,
        name: query.name,
        content: query.content,
        page: query.page,
        per_page: query.per_page,
        order: query.order,
        direction: query.direction,
    };
    let page = state
        .cloudflare
        .list_dns_records(&token, &zone_id, &filters)
        .await?;

    Ok(Json(ListRecordsResponse {
        success: true,
        records: page.records,
        total: page.total,
    }))
}

/// Create a DNS record
#[utoipa::path(
    post,
    path = "/api/cloudflare/dns",
    tag = "DNS",
    params(ZoneQuery),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn create_record(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Query(query): Query<ZoneQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let (zone_id, record) = split_zone_id(query.zone_id, body)?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_name = state.zone_guard.check(&token, &zone_id).await?;

    let created = state
        .cloudflare
        .create_dns_record(&token, &zone_id, &record)
        .await?;

    let mut entry = audit_entry(
        auth.user(),
        AuditAction::DnsCreate,
        &zone_id,
        zone_name,
        record_label(&created, "record"),
    );
    entry.after = Some(created.clone());
    state.audit.record(entry).await;

    Ok(Json(serde_json::json!({ "success": true, "result": created })))
}

/// Replace a DNS record
#[utoipa::path(
    put,
    path = "/api/cloudflare/dns/{record_id}",
    tag = "DNS",
    params(
        ("record_id" = String, Path, description = "DNS record id"),
        ZoneQuery
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn update_record(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Path(record_id): Path<String>,
    Query(query): Query<ZoneQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    check_id(&record_id, "recordId")?;
    let (zone_id, record) = split_zone_id(query.zone_id, body)?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_name = state.zone_guard.check(&token, &zone_id).await?;

    let before = snapshot(&state, &token, &zone_id, &record_id).await;
    let updated = state
        .cloudflare
        .update_dns_record(&token, &zone_id, &record_id, &record)
        .await?;

    let mut entry = audit_entry(
        auth.user(),
        AuditAction::DnsUpdate,
        &zone_id,
        zone_name,
        record_label(&updated, &record_id),
    );
    entry.before = before;
    entry.after = Some(updated.clone());
    state.audit.record(entry).await;

    Ok(Json(serde_json::json!({ "success": true, "result": updated })))
}

/// Delete a DNS record
#[utoipa::path(
    delete,
    path = "/api/cloudflare/dns/{record_id}",
    tag = "DNS",
    params(
        ("record_id" = String, Path, description = "DNS record id"),
        ZoneQuery
    ),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn delete_record(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Path(record_id): Path<String>,
    Query(query): Query<ZoneQuery>,
) -> Result<Json<Value>> {
    check_id(&record_id, "recordId")?;
    let zone_id = require_zone_id(query.zone_id)?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_name = state.zone_guard.check(&token, &zone_id).await?;

    let before = snapshot(&state, &token, &zone_id, &record_id).await;
    state
        .cloudflare
        .delete_dns_record(&token, &zone_id, &record_id)
        .await?;

    let target = before
        .as_ref()
        .map(|r| record_label(r, &record_id))
        .unwrap_or_else(|| record_id.clone());
    let mut entry = audit_entry(auth.user(), AuditAction::DnsDelete, &zone_id, zone_name, target);
    entry.before = before;
    state.audit.record(entry).await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Delete many records at once; individual failures are counted, not raised
#[utoipa::path(
    post,
    path = "/api/cloudflare/dns/batch",
    tag = "DNS",
    params(ZoneQuery),
    request_body = BatchDeleteRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn batch_delete(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Query(query): Query<ZoneQuery>,
    Json(request): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>> {
    let zone_id = require_zone_id(request.zone_id.or(query.zone_id))?;
    if request.record_ids.is_empty() {
        return Err(AppError::BadRequest("recordIds must not be empty".to_string()));
    }
    for record_id in &request.record_ids {
        check_id(record_id, "recordId")?;
    }

    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_name = state.zone_guard.check(&token, &zone_id).await?;

    let outcomes = join_all(request.record_ids.iter().map(|record_id| {
        let client = state.cloudflare.clone();
        let token = token.as_str();
        let zone_id = zone_id.as_str();
        async move {
            let outcome = client.delete_dns_record(token, zone_id, record_id).await;
            (record_id.clone(), outcome)
        }
    }))
    .await;

    let mut deleted = Vec::new();
    for (record_id, outcome) in outcomes {
        match outcome {
            Ok(()) => deleted.push(record_id),
            Err(e) => tracing::warn!("Batch delete of DNS record {} failed: {}", record_id, e),
        }
    }

    let total = request.record_ids.len();
    if !deleted.is_empty() {
        let mut entry = audit_entry(
            auth.user(),
            AuditAction::DnsBatchDelete,
            &zone_id,
            zone_name,
            format!("{} records", deleted.len()),
        );
        entry.before = Some(serde_json::json!({ "recordIds": deleted }));
        state.audit.record(entry).await;
    }

    Ok(Json(BatchDeleteResponse {
        success: true,
        deleted: deleted.len(),
        failed: total - deleted.len(),
        total,
    }))
}

/// Download the zone as a BIND file
#[utoipa::path(
    get,
    path = "/api/cloudflare/dns/export",
    tag = "DNS",
    params(ZoneQuery),
    responses(
        (status = 200, content_type = "text/plain", body = String)
    )
)]
pub async fn export_records(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<ZoneQuery>,
) -> Result<Response> {
    let zone_id = require_zone_id(query.zone_id)?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_file = state.cloudflare.export_dns_records(&token, &zone_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"dns-{}.txt\"", zone_id),
            ),
        ],
        zone_file,
    )
        .into_response())
}

/// Import a BIND zone file
#[utoipa::path(
    post,
    path = "/api/cloudflare/dns/import",
    tag = "DNS",
    params(ZoneQuery),
    request_body = ImportRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = serde_json::Value)
    )
)]
pub async fn import_records(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Query(query): Query<ZoneQuery>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<Value>> {
    let zone_id = require_zone_id(request.zone_id.or(query.zone_id))?;
    if request.content.trim().is_empty() {
        return Err(AppError::BadRequest("content must not be empty".to_string()));
    }

    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let zone_name = state.zone_guard.check(&token, &zone_id).await?;

    let result = state
        .cloudflare
        .import_dns_records(&token, &zone_id, request.content)
        .await?;

    let mut entry = audit_entry(
        auth.user(),
        AuditAction::DnsImport,
        &zone_id,
        zone_name,
        "zone file".to_string(),
    );
    entry.after = Some(result.clone());
    state.audit.record(entry).await;

    Ok(Json(serde_json::json!({ "success": true, "result": result })))
}
