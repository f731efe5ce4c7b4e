//! Cloudflare REST v4 client
//!
//! Every call takes the caller's resolved API token; the client itself holds
//! no credentials. Non-success responses surface as [`AppError::Upstream`]
//! carrying Cloudflare's own message where one is available.

use chrono::{Duration, Utc};
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::config::cloudflare::CloudflareConfig;
use crate::error::{AppError, Result};

// ============================================================================
// Cloudflare API response envelope
// ============================================================================

#[derive(Deserialize)]
struct CfResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<CfApiError>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Deserialize)]
struct CfApiError {
    message: String,
}

/// Error-only view of a response body, used for non-2xx replies
#[derive(Deserialize)]
struct CfErrorBody {
    #[serde(default)]
    errors: Vec<CfApiError>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResultInfo {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub count: Option<u64>,
    pub total_count: Option<u64>,
}

/// Longest id accepted from callers; Cloudflare's own ids are 32 hex digits
const MAX_ID_LEN: usize = 64;

/// Accept only values shaped like a Cloudflare identifier
///
/// Ids end up as URL path segments, so anything outside `[A-Za-z0-9_-]` is
/// refused before a request is built.
pub fn check_id(value: &str, name: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("{} is not a valid Cloudflare id", name)))
    }
}

/// Present, non-blank and a valid Cloudflare id
pub fn require_id(value: Option<String>, name: &str) -> Result<String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", name)))?;
    check_id(&value, name)?;
    Ok(value)
}

/// API path built from individually percent-encoded segments
pub fn api_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect()
}

fn upstream_message(errors: Vec<CfApiError>, status: StatusCode) -> String {
    errors
        .into_iter()
        .next()
        .map(|e| e.message)
        .unwrap_or_else(|| format!("Cloudflare API error: {}", status.as_u16()))
}

// ============================================================================
// Public Request / Response Types
// ============================================================================

/// Zone fields the backend itself relies on
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub account: Option<ZoneAccount>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ZoneAccount {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// DNS record list filters, forwarded as Cloudflare query parameters
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DnsRecordFilters {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub name: Option<String>,
    pub content: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order: Option<String>,
    pub direction: Option<String>,
}

impl DnsRecordFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("per_page", self.per_page.unwrap_or(100).to_string()),
            ("page", self.page.unwrap_or(1).to_string()),
        ];
        let optional = [
            ("type", &self.record_type),
            ("name", &self.name),
            ("content", &self.content),
            ("order", &self.order),
            ("direction", &self.direction),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                query.push((key, value.clone()));
            }
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DnsRecordPage {
    pub records: Vec<Value>,
    pub total: u64,
}

// ============================================================================
// Client
// ============================================================================

/// Shared Cloudflare API client (cheap to clone)
#[derive(Clone, Debug)]
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
}

impl CloudflareClient {
    pub fn new(config: &CloudflareConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build Cloudflare HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    fn post(&self, token: &str, path: &str) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    fn put(&self, token: &str, path: &str) -> RequestBuilder {
        self.http
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    fn patch(&self, token: &str, path: &str) -> RequestBuilder {
        self.http
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    fn delete(&self, token: &str, path: &str) -> RequestBuilder {
        self.http
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Send a request and unwrap the `{success, errors, result}` envelope
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<CfResponse<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let errors = serde_json::from_slice::<CfErrorBody>(&body)
                .map(|b| b.errors)
                .unwrap_or_default();
            return Err(AppError::Upstream(upstream_message(errors, status)));
        }

        let parsed: CfResponse<T> = serde_json::from_slice(&body)
            .map_err(|e| AppError::Upstream(format!("Invalid Cloudflare response: {}", e)))?;

        if !parsed.success {
            return Err(AppError::Upstream(upstream_message(parsed.errors, status)));
        }

        Ok(parsed)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        self.execute(request).await?.result.ok_or_else(|| {
            AppError::Upstream(format!("Cloudflare API returned no result for: {}", context))
        })
    }

    /// Issue a read-only GET and report only the HTTP status
    pub async fn probe_status(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<StatusCode, reqwest::Error> {
        let response = self.get(token, path).query(query).send().await?;
        Ok(response.status())
    }

    // ------------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------------

    /// Check that a token can at least list zones
    pub async fn verify_token(&self, token: &str) -> Result<()> {
        self.first_zone(token).await.map(|_| ())
    }

    /// First zone visible to the token, if any (`GET /zones?per_page=1`)
    pub async fn first_zone(&self, token: &str) -> Result<Option<Value>> {
        let zones: Vec<Value> = self
            .call(self.get(token, "/zones").query(&[("per_page", "1")]), "list zones")
            .await?;
        Ok(zones.into_iter().next())
    }

    /// Active zones, first page of 50
    pub async fn list_zones(&self, token: &str) -> Result<Vec<Value>> {
        self.call(
            self.get(token, "/zones")
                .query(&[("per_page", "50"), ("status", "active")]),
            "list zones",
        )
        .await
    }

    pub async fn get_zone(&self, token: &str, zone_id: &str) -> Result<Zone> {
        self.call(self.get(token, &api_path(&["zones", zone_id])), "get zone")
            .await
    }

    // ------------------------------------------------------------------------
    // DNS records
    // ------------------------------------------------------------------------

    pub async fn list_dns_records(
        &self,
        token: &str,
        zone_id: &str,
        filters: &DnsRecordFilters,
    ) -> Result<DnsRecordPage> {
        let response: CfResponse<Vec<Value>> = self
            .execute(
                self.get(token, &api_path(&["zones", zone_id, "dns_records"]))
                    .query(&filters.to_query()),
            )
            .await?;

        let records = response.result.unwrap_or_default();
        let total = response
            .result_info
            .and_then(|info| info.total_count)
            .unwrap_or(records.len() as u64);

        Ok(DnsRecordPage { records, total })
    }

    pub async fn get_dns_record(&self, token: &str, zone_id: &str, record_id: &str) -> Result<Value> {
        self.call(
            self.get(token, &api_path(&["zones", zone_id, "dns_records", record_id])),
            "get DNS record",
        )
        .await
    }

    pub async fn create_dns_record(&self, token: &str, zone_id: &str, record: &Value) -> Result<Value> {
        self.call(
            self.post(token, &api_path(&["zones", zone_id, "dns_records"]))
                .json(record),
            "create DNS record",
        )
        .await
    }

    pub async fn update_dns_record(
        &self,
        token: &str,
        zone_id: &str,
        record_id: &str,
        record: &Value,
    ) -> Result<Value> {
        self.call(
            self.put(token, &api_path(&["zones", zone_id, "dns_records", record_id]))
                .json(record),
            "update DNS record",
        )
        .await
    }

    pub async fn delete_dns_record(&self, token: &str, zone_id: &str, record_id: &str) -> Result<()> {
        self.execute::<Value>(
            self.delete(token, &api_path(&["zones", zone_id, "dns_records", record_id])),
        )
        .await?;
        Ok(())
    }

    /// Zone file export (BIND format, plain text)
    pub async fn export_dns_records(&self, token: &str, zone_id: &str) -> Result<String> {
        let response = self
            .get(token, &api_path(&["zones", zone_id, "dns_records", "export"]))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let errors = serde_json::from_str::<CfErrorBody>(&body)
                .map(|b| b.errors)
                .unwrap_or_default();
            return Err(AppError::Upstream(upstream_message(errors, status)));
        }
        Ok(body)
    }

    /// Upload a BIND zone file; returns `{recs_added, total_records_parsed}`
    pub async fn import_dns_records(&self, token: &str, zone_id: &str, content: String) -> Result<Value> {
        let part = multipart::Part::text(content)
            .file_name("dns_records.txt")
            .mime_str("text/plain")?;
        let form = multipart::Form::new().part("file", part);

        self.call(
            self.post(token, &api_path(&["zones", zone_id, "dns_records", "import"]))
                .multipart(form),
            "import DNS records",
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Zone settings and cache
    // ------------------------------------------------------------------------

    pub async fn list_zone_settings(&self, token: &str, zone_id: &str) -> Result<Value> {
        self.call(
            self.get(token, &api_path(&["zones", zone_id, "settings"])),
            "list zone settings",
        )
        .await
    }

    pub async fn update_zone_setting(
        &self,
        token: &str,
        zone_id: &str,
        setting_id: &str,
        value: Value,
    ) -> Result<Value> {
        self.call(
            self.patch(token, &api_path(&["zones", zone_id, "settings", setting_id]))
                .json(&serde_json::json!({ "value": value })),
            "update zone setting",
        )
        .await
    }

    /// Purge the given URLs, or the whole zone when `urls` is `None`
    pub async fn purge_cache(&self, token: &str, zone_id: &str, urls: Option<Vec<String>>) -> Result<Value> {
        let body = match urls {
            Some(files) => serde_json::json!({ "files": files }),
            None => serde_json::json!({ "purge_everything": true }),
        };
        self.call(
            self.post(token, &api_path(&["zones", zone_id, "purge_cache"]))
                .json(&body),
            "purge cache",
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Email routing, firewall, workers
    // ------------------------------------------------------------------------

    pub async fn list_email_routing_rules(&self, token: &str, zone_id: &str) -> Result<Value> {
        self.call(
            self.get(token, &api_path(&["zones", zone_id, "email", "routing", "rules"])),
            "list email routing rules",
        )
        .await
    }

    pub async fn update_email_routing_rule(
        &self,
        token: &str,
        zone_id: &str,
        rule_id: &str,
        rule: &Value,
    ) -> Result<Value> {
        self.call(
            self.put(token, &api_path(&["zones", zone_id, "email", "routing", "rules", rule_id]))
                .json(rule),
            "update email routing rule",
        )
        .await
    }

    pub async fn delete_email_routing_rule(&self, token: &str, zone_id: &str, rule_id: &str) -> Result<()> {
        self.execute::<Value>(self.delete(
            token,
            &api_path(&["zones", zone_id, "email", "routing", "rules", rule_id]),
        ))
        .await?;
        Ok(())
    }

    pub async fn list_firewall_access_rules(&self, token: &str, zone_id: &str) -> Result<Value> {
        self.call(
            self.get(token, &api_path(&["zones", zone_id, "firewall", "access_rules", "rules"])),
            "list firewall access rules",
        )
        .await
    }

    pub async fn list_workers_routes(&self, token: &str, zone_id: &str) -> Result<Value> {
        self.call(
            self.get(token, &api_path(&["zones", zone_id, "workers", "routes"])),
            "list workers routes",
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Account scoped
    // ------------------------------------------------------------------------

    /// Account-level lists of kind `redirect` (bulk redirects)
    pub async fn list_redirect_lists(&self, token: &str, cf_account_id: &str) -> Result<Vec<Value>> {
        let lists: Vec<Value> = self
            .call(
                self.get(token, &api_path(&["accounts", cf_account_id, "rules", "lists"])),
                "list bulk redirect lists",
            )
            .await?;

        Ok(lists
            .into_iter()
            .filter(|list| list.get("kind").and_then(Value::as_str) == Some("redirect"))
            .collect())
    }

    // ------------------------------------------------------------------------
    // Analytics (GraphQL)
    // ------------------------------------------------------------------------

    /// Daily request groups for a zone; dates are `YYYY-MM-DD`, defaulting to the last 7 days
    pub async fn zone_analytics(
        &self,
        token: &str,
        zone_id: &str,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<Value> {
        let today = Utc::now().date_naive();
        let since = since
            .map(String::from)
            .unwrap_or_else(|| (today - Duration::days(7)).format("%Y-%m-%d").to_string());
        let until = until
            .map(String::from)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

        let body = serde_json::json!({
            "query": ANALYTICS_QUERY,
            "variables": { "zoneTag": zone_id, "since": since, "until": until },
        });

        let response = self.post(token, "/graphql").json(&body).send().await?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Cloudflare response: {}", e)))?;

        if let Some(message) = payload
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return Err(AppError::Upstream(message.to_string()));
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Cloudflare API error: {}",
                status.as_u16()
            )));
        }

        Ok(payload
            .pointer("/data/viewer/zones/0/httpRequests1dGroups")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }
}

const ANALYTICS_QUERY: &str = r#"query ZoneAnalytics($zoneTag: string, $since: Date!, $until: Date!) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      httpRequests1dGroups(limit: 100, filter: { date_geq: $since, date_leq: $until }, orderBy: [date_ASC]) {
        dimensions { date }
        sum { requests bytes cachedRequests cachedBytes threats pageViews }
        uniq { uniques }
      }
    }
  }
}"#;
