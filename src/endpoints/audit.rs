use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::permissions::{AuditView, Authorized};
use crate::services::audit::{get_audit_logs, AuditLogPage, AuditLogQuery};
use crate::state::AppState;

/// Create audit routes
pub fn audit_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_audit_logs))
        .with_state(state)
}

/// `{success, result, total, page, pageSize}`
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: AuditLogPage,
}

/// List audit logs with filtering and pagination, newest first
#[utoipa::path(
    get,
    path = "/api/admin/audit-log",
    tag = "Audit",
    params(
        ("page" = Option<u64>, Query, description = "Page number, starting at 1"),
        ("pageSize" = Option<u64>, Query, description = "Entries per page (1-100, default 50)"),
        ("action" = Option<String>, Query, description = "Substring of the action name"),
        ("userEmail" = Option<String>, Query, description = "Substring of the actor's email"),
        ("zoneId" = Option<String>, Query, description = "Exact zone id")
    ),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _auth: Authorized<AuditView>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogResponse>> {
    let page = get_audit_logs(&state.db, query).await?;
    Ok(Json(AuditLogResponse {
        success: true,
        page,
    }))
}
