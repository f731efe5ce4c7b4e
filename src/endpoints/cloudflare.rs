//! Cloudflare pass-through endpoints
//!
//! Thin wrappers: resolve the caller's token for `accountId`, forward one
//! call, wrap the result. DNS lives in its own module because its writes are
//! guarded and audited.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::endpoints::{dns, resolve_token, ApiResponse};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{Authorized, CloudflareManage, CloudflareView};
use crate::services::cloudflare::{check_id, require_id};
use crate::state::AppState;

/// Create the Cloudflare routes
pub fn cloudflare_routes(state: AppState) -> Router {
    Router::new()
        .route("/zones", get(list_zones))
        .route("/zone-settings", get(get_zone_settings).patch(update_zone_setting))
        .route("/cache", post(purge_cache))
        .route("/email-routing", get(list_email_routing))
        .route(
            "/email-routing/{rule_id}",
            put(update_email_routing).delete(delete_email_routing),
        )
        .route("/firewall", get(list_firewall_rules))
        .route("/workers-routes", get(list_workers_routes))
        .route("/analytics", get(get_analytics))
        .route("/redirects", get(list_redirects))
        .with_state(state.clone())
        .nest("/dns", dns::dns_routes(state))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AccountQuery {
    pub account_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SettingQuery {
    pub account_id: Option<String>,
    pub zone_id: Option<String>,
    pub setting_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    pub account_id: Option<String>,
    pub zone_id: Option<String>,
    /// `YYYY-MM-DD`, defaults to seven days ago
    pub since: Option<String>,
    /// `YYYY-MM-DD`, defaults to today
    pub until: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RedirectsQuery {
    pub account_id: Option<String>,
    /// Cloudflare's own account id; discovered from the first zone when absent
    pub cf_account_id: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SettingUpdate {
    pub value: Value,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CachePurgeRequest {
    pub urls: Option<Value>,
}

// ============================================================================
// Helpers
// ============================================================================


/// URLs to purge, or `None` to purge everything
fn purge_targets(urls: Option<&Value>) -> Option<Vec<String>> {
    let list: Vec<String> = urls?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from)
        .collect();
    (!list.is_empty()).then_some(list)
}

fn check_date(value: Option<&str>, name: &str) -> Result<()> {
    if let Some(raw) = value {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("{} must be a YYYY-MM-DD date", name)))?;
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Active zones visible to the selected account
#[utoipa::path(
    get,
    path = "/api/cloudflare/zones",
    tag = "Cloudflare",
    params(AccountQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_zones(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>> {
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(state.cloudflare.list_zones(&token).await?))
}

#[utoipa::path(
    get,
    path = "/api/cloudflare/zone-settings",
    tag = "Cloudflare",
    params(SettingQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn get_zone_settings(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<SettingQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state.cloudflare.list_zone_settings(&token, &zone_id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/cloudflare/zone-settings",
    tag = "Cloudflare",
    params(SettingQuery),
    request_body = SettingUpdate,
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn update_zone_setting(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Query(query): Query<SettingQuery>,
    Json(update): Json<SettingUpdate>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let setting_id = require_id(query.setting_id, "settingId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;

    let result = state
        .cloudflare
        .update_zone_setting(&token, &zone_id, &setting_id, update.value)
        .await?;
    tracing::info!(
        "{} changed zone setting {} on {}",
        auth.user().email,
        setting_id,
        zone_id
    );
    Ok(ApiResponse::ok(result))
}

/// Purge the listed URLs, or the entire zone when no URLs are given
#[utoipa::path(
    post,
    path = "/api/cloudflare/cache",
    tag = "Cloudflare",
    params(crate::endpoints::dns::ZoneQuery),
    request_body = CachePurgeRequest,
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn purge_cache(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Query(query): Query<dns::ZoneQuery>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let request: CachePurgeRequest = if body.is_empty() {
        CachePurgeRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    let targets = purge_targets(request.urls.as_ref());
    match &targets {
        Some(urls) => tracing::info!("Purging {} URLs from zone {}", urls.len(), zone_id),
        None => tracing::info!("Purging everything from zone {}", zone_id),
    }

    Ok(ApiResponse::ok(
        state.cloudflare.purge_cache(&token, &zone_id, targets).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/cloudflare/email-routing",
    tag = "Cloudflare",
    params(crate::endpoints::dns::ZoneQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_email_routing(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<dns::ZoneQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state.cloudflare.list_email_routing_rules(&token, &zone_id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/cloudflare/email-routing/{rule_id}",
    tag = "Cloudflare",
    params(
        ("rule_id" = String, Path, description = "Routing rule id"),
        crate::endpoints::dns::ZoneQuery
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn update_email_routing(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Path(rule_id): Path<String>,
    Query(query): Query<dns::ZoneQuery>,
    Json(rule): Json<Value>,
) -> Result<Json<ApiResponse<Value>>> {
    check_id(&rule_id, "ruleId")?;
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state
            .cloudflare
            .update_email_routing_rule(&token, &zone_id, &rule_id, &rule)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cloudflare/email-routing/{rule_id}",
    tag = "Cloudflare",
    params(
        ("rule_id" = String, Path, description = "Routing rule id"),
        crate::endpoints::dns::ZoneQuery
    ),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn delete_email_routing(
    State(state): State<AppState>,
    auth: Authorized<CloudflareManage>,
    Path(rule_id): Path<String>,
    Query(query): Query<dns::ZoneQuery>,
) -> Result<Json<Value>> {
    check_id(&rule_id, "ruleId")?;
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    state
        .cloudflare
        .delete_email_routing_rule(&token, &zone_id, &rule_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// IP access rules of a zone
#[utoipa::path(
    get,
    path = "/api/cloudflare/firewall",
    tag = "Cloudflare",
    params(crate::endpoints::dns::ZoneQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_firewall_rules(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<dns::ZoneQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state
            .cloudflare
            .list_firewall_access_rules(&token, &zone_id)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/cloudflare/workers-routes",
    tag = "Cloudflare",
    params(crate::endpoints::dns::ZoneQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_workers_routes(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<dns::ZoneQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state.cloudflare.list_workers_routes(&token, &zone_id).await?,
    ))
}

/// Daily HTTP request totals for a zone
#[utoipa::path(
    get,
    path = "/api/cloudflare/analytics",
    tag = "Cloudflare",
    params(AnalyticsQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn get_analytics(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let zone_id = require_id(query.zone_id, "zoneId")?;
    check_date(query.since.as_deref(), "since")?;
    check_date(query.until.as_deref(), "until")?;

    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;
    Ok(ApiResponse::ok(
        state
            .cloudflare
            .zone_analytics(&token, &zone_id, query.since.as_deref(), query.until.as_deref())
            .await?,
    ))
}

/// Bulk redirect lists of the Cloudflare account
#[utoipa::path(
    get,
    path = "/api/cloudflare/redirects",
    tag = "Cloudflare",
    params(RedirectsQuery),
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
pub async fn list_redirects(
    State(state): State<AppState>,
    auth: Authorized<CloudflareView>,
    Query(query): Query<RedirectsQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>> {
    let token = resolve_token(&state, query.account_id.as_deref(), auth.user()).await?;

    let cf_account_id = match query.cf_account_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            check_id(&id, "cfAccountId")?;
            id
        }
        None => state
            .cloudflare
            .first_zone(&token)
            .await?
            .and_then(|zone| {
                zone.pointer("/account/id")
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .ok_or_else(|| {
                AppError::BadRequest("No Cloudflare account id could be determined".to_string())
            })?,
    };

    Ok(ApiResponse::ok(
        state
            .cloudflare
            .list_redirect_lists(&token, &cf_account_id)
            .await?,
    ))
}
