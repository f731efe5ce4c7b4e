use axum::Json;
use utoipa::OpenApi;

use crate::endpoints::{audit, auth, cf_accounts, cloudflare, dns, profile, users, webhooks};

#[derive(OpenApi)]
#[openapi(
    info(title = "cf-admin", description = "Multi-tenant Cloudflare administration API"),
    paths(
        auth::login,
        auth::logout,
        users::list_users,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::reset_password,
        users::replace_cf_accounts,
        profile::change_own_password,
        cf_accounts::list_accounts,
        cf_accounts::create_account,
        cf_accounts::update_account,
        cf_accounts::delete_account,
        cf_accounts::test_account,
        audit::list_audit_logs,
        webhooks::list_webhooks,
        webhooks::create_webhook,
        webhooks::update_webhook,
        webhooks::delete_webhook,
        cloudflare::list_zones,
        cloudflare::get_zone_settings,
        cloudflare::update_zone_setting,
        cloudflare::purge_cache,
        cloudflare::list_email_routing,
        cloudflare::update_email_routing,
        cloudflare::delete_email_routing,
        cloudflare::list_firewall_rules,
        cloudflare::list_workers_routes,
        cloudflare::get_analytics,
        cloudflare::list_redirects,
        dns::list_records,
        dns::create_record,
        dns::update_record,
        dns::delete_record,
        dns::batch_delete,
        dns::export_records,
        dns::import_records,
    ),
    tags(
        (name = "Auth", description = "Session login and logout"),
        (name = "Users", description = "User and account binding administration"),
        (name = "Cloudflare Accounts", description = "Stored Cloudflare credentials"),
        (name = "DNS", description = "Guarded and audited DNS record management"),
        (name = "Cloudflare", description = "Zone configuration pass-through"),
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
