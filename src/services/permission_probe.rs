//! Token permission prober
//!
//! Classifies what a Cloudflare token can do by issuing read-only requests
//! only. Capabilities that cannot be checked without side effects (cache
//! purge) are always reported as unverified.

use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::DbConn;
use crate::error::{AppError, Result};
use crate::models::cf_account;
use crate::models::prelude::*;
use crate::services::cloudflare::{api_path, CloudflareClient};

/// Outcome of a single capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermStatus {
    Ok,
    Missing,
    Error,
    Unverified,
}

/// Overall verdict stored as the account's `last_test_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Ok,
    Warning,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Ok => "ok",
            TestStatus::Warning => "warning",
            TestStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub key: String,
    pub label: String,
    pub status: PermStatus,
    /// Cloudflare permission to grant, shown when the capability is not confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProbeReport {
    pub status: TestStatus,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn permission(&self, key: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.key == key)
    }
}

struct Capability {
    key: &'static str,
    label: &'static str,
    cf_permission: &'static str,
    required: bool,
}

const ZONES: Capability = Capability {
    key: "zones",
    label: "Zone list",
    cf_permission: "Zone → Zone → Read",
    required: true,
};
const DNS: Capability = Capability {
    key: "dns",
    label: "DNS records",
    cf_permission: "Zone → DNS → Edit",
    required: true,
};
const ZONE_SETTINGS: Capability = Capability {
    key: "zone_settings",
    label: "Zone settings",
    cf_permission: "Zone → Zone Settings → Edit",
    required: false,
};
const CACHE: Capability = Capability {
    key: "cache",
    label: "Cache purge",
    cf_permission: "Zone → Cache Purge → Purge",
    required: false,
};
const EMAIL_ROUTING: Capability = Capability {
    key: "email_routing",
    label: "Email routing",
    cf_permission: "Zone → Email Routing Rules → Edit",
    required: false,
};
const FIREWALL: Capability = Capability {
    key: "firewall",
    label: "Firewall rules",
    cf_permission: "Zone → Firewall Services → Edit",
    required: false,
};
const WORKERS_ROUTES: Capability = Capability {
    key: "workers_routes",
    label: "Workers routes",
    cf_permission: "Zone → Workers Routes → Read",
    required: false,
};
const ANALYTICS: Capability = Capability {
    key: "analytics",
    label: "Analytics",
    cf_permission: "Zone → Analytics → Read",
    required: false,
};
const REDIRECTS: Capability = Capability {
    key: "redirects",
    label: "Bulk redirects",
    cf_permission: "Account → Account Filter Lists → Read",
    required: false,
};

const ALL_CAPABILITIES: [&Capability; 9] = [
    &ZONES,
    &DNS,
    &ZONE_SETTINGS,
    &CACHE,
    &EMAIL_ROUTING,
    &FIREWALL,
    &WORKERS_ROUTES,
    &ANALYTICS,
    &REDIRECTS,
];

const PAGE_OF_ONE: &[(&str, &str)] = &[("per_page", "1")];

fn is_required(key: &str) -> bool {
    ALL_CAPABILITIES
        .iter()
        .any(|c| c.key == key && c.required)
}

/// Result of one probe before it is labelled
struct Probe {
    status: PermStatus,
    note: Option<String>,
}

impl Probe {
    fn new(status: PermStatus) -> Self {
        Self { status, note: None }
    }

    fn with_note(status: PermStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            note: Some(note.into()),
        }
    }

    fn into_permission(self, capability: &Capability) -> Permission {
        let cf_permission = match self.status {
            PermStatus::Missing | PermStatus::Unverified => {
                Some(capability.cf_permission.to_string())
            }
            PermStatus::Ok | PermStatus::Error => None,
        };
        Permission {
            key: capability.key.to_string(),
            label: capability.label.to_string(),
            status: self.status,
            cf_permission,
            note: self.note,
        }
    }
}

/// Aggregate verdict: required capabilities decide `error`, optional ones `warning`
pub fn overall_status(permissions: &[Permission]) -> TestStatus {
    let required_ok = permissions
        .iter()
        .filter(|p| is_required(&p.key))
        .all(|p| p.status == PermStatus::Ok);
    let dns_ok = permissions
        .iter()
        .any(|p| p.key == DNS.key && p.status == PermStatus::Ok);

    if !required_ok || !dns_ok {
        TestStatus::Error
    } else if permissions
        .iter()
        .any(|p| !is_required(&p.key) && p.status == PermStatus::Missing)
    {
        TestStatus::Warning
    } else {
        TestStatus::Ok
    }
}

#[derive(Clone, Debug)]
pub struct PermissionProber {
    client: CloudflareClient,
    probe_timeout: Duration,
}

impl PermissionProber {
    pub fn new(client: CloudflareClient, probe_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
        }
    }

    /// Run the full probe battery against `token`
    pub async fn probe(&self, token: &str) -> ProbeReport {
        let first_zone = match tokio::time::timeout(self.probe_timeout, self.client.first_zone(token)).await {
            Ok(Ok(zone)) => zone,
            Ok(Err(AppError::Upstream(message))) => return Self::zone_list_failed(message),
            Ok(Err(e)) => return Self::zone_list_failed(e.to_string()),
            Err(_) => return Self::zone_list_failed(self.timeout_note()),
        };

        let zone_id = first_zone
            .as_ref()
            .and_then(|z| z.get("id"))
            .and_then(Value::as_str)
            .map(String::from);
        let cf_account_id = first_zone
            .as_ref()
            .and_then(|z| z.pointer("/account/id"))
            .and_then(Value::as_str)
            .map(String::from);

        let zone_probes = async {
            let Some(zone_id) = zone_id.as_deref() else {
                return None;
            };
            let (dns, settings, email, firewall, workers, analytics) = tokio::join!(
                self.check(token, api_path(&["zones", zone_id, "dns_records"]), PAGE_OF_ONE),
                self.check(token, api_path(&["zones", zone_id, "settings", "ssl"]), &[]),
                self.check(token, api_path(&["zones", zone_id, "email", "routing", "rules"]), &[]),
                self.check(token, api_path(&["zones", zone_id, "firewall", "access_rules", "rules"]), PAGE_OF_ONE),
                self.check(token, api_path(&["zones", zone_id, "workers", "routes"]), &[]),
                self.check(token, api_path(&["zones", zone_id, "analytics", "dashboard"]), &[]),
            );
            Some([
                (&DNS, dns),
                (&ZONE_SETTINGS, settings),
                (&EMAIL_ROUTING, email),
                (&FIREWALL, firewall),
                (&WORKERS_ROUTES, workers),
                (&ANALYTICS, analytics),
            ])
        };

        let account_probe = async {
            match cf_account_id.as_deref() {
                Some(account_id) => {
                    self.check(token, api_path(&["accounts", account_id, "rules", "lists"]), &[])
                        .await
                }
                None => Probe::with_note(PermStatus::Error, "no account id"),
            }
        };

        let (zone_results, redirects) = tokio::join!(zone_probes, account_probe);

        let mut permissions = vec![
            Probe::new(PermStatus::Ok).into_permission(&ZONES),
            Self::cache_permission(),
        ];
        match zone_results {
            Some(results) => {
                permissions.extend(results.into_iter().map(|(c, p)| p.into_permission(c)));
            }
            None => {
                for capability in [&DNS, &ZONE_SETTINGS, &EMAIL_ROUTING, &FIREWALL, &WORKERS_ROUTES, &ANALYTICS] {
                    permissions.push(
                        Probe::with_note(PermStatus::Error, "no available zone")
                            .into_permission(capability),
                    );
                }
            }
        }
        permissions.push(redirects.into_permission(&REDIRECTS));
        permissions.sort_by_key(|p| ALL_CAPABILITIES.iter().position(|c| c.key == p.key));

        ProbeReport {
            status: overall_status(&permissions),
            permissions,
            error: None,
        }
    }

    /// Probe `token`, then store the verdict on the account whatever it is
    pub async fn test_account(&self, db: &DbConn, account_id: &str, token: &str) -> Result<ProbeReport> {
        let report = self.probe(token).await;
        record_test_result(db, account_id, report.status).await?;

        tracing::info!(
            account_id = %account_id,
            status = report.status.as_str(),
            "Cloudflare token permission test finished"
        );
        Ok(report)
    }

    async fn check(&self, token: &str, path: String, query: &[(&str, &str)]) -> Probe {
        match tokio::time::timeout(self.probe_timeout, self.client.probe_status(token, &path, query)).await {
            Ok(Ok(StatusCode::FORBIDDEN)) => Probe::new(PermStatus::Missing),
            Ok(Ok(_)) => Probe::new(PermStatus::Ok),
            Ok(Err(e)) => {
                tracing::debug!("Permission probe {} failed: {}", path, e);
                Probe::with_note(PermStatus::Error, format!("request failed: {}", e))
            }
            Err(_) => Probe::with_note(PermStatus::Error, self.timeout_note()),
        }
    }

    fn timeout_note(&self) -> String {
        format!("timed out after {}s", self.probe_timeout.as_secs())
    }

    pub(crate) fn cache_permission() -> Permission {
        Probe::with_note(
            PermStatus::Unverified,
            "cannot be tested without purging the cache",
        )
        .into_permission(&CACHE)
    }

    fn zone_list_failed(message: String) -> ProbeReport {
        ProbeReport {
            status: TestStatus::Error,
            permissions: vec![
                Probe::with_note(PermStatus::Error, message.clone()).into_permission(&ZONES),
                Self::cache_permission(),
            ],
            error: Some(message),
        }
    }
}

/// Persist `last_test_at = now` and `last_test_status` on an account
pub async fn record_test_result(db: &DbConn, account_id: &str, status: TestStatus) -> Result<()> {
    let account = CfAccount::find_by_id(account_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::AccountNotFound("Cloudflare account not found".to_string()))?;

    let mut active: cf_account::ActiveModel = account.into();
    active.last_test_at = Set(Some(Utc::now()));
    active.last_test_status = Set(Some(status.as_str().to_string()));
    active.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(capability: &Capability, status: PermStatus) -> Permission {
        Probe::new(status).into_permission(capability)
    }

    fn all_ok() -> Vec<Permission> {
        ALL_CAPABILITIES
            .iter()
            .map(|c| {
                if c.key == CACHE.key {
                    perm(c, PermStatus::Unverified)
                } else {
                    perm(c, PermStatus::Ok)
                }
            })
            .collect()
    }

    fn with_status(mut permissions: Vec<Permission>, key: &str, status: PermStatus) -> Vec<Permission> {
        for p in permissions.iter_mut().filter(|p| p.key == key) {
            p.status = status;
        }
        permissions
    }

    #[test]
    fn test_all_ok_with_unverified_cache_is_ok() {
        assert_eq!(overall_status(&all_ok()), TestStatus::Ok);
    }

    #[test]
    fn test_missing_dns_is_error() {
        let permissions = with_status(all_ok(), "dns", PermStatus::Missing);
        assert_eq!(overall_status(&permissions), TestStatus::Error);
    }

    #[test]
    fn test_errored_dns_is_error() {
        let permissions = with_status(all_ok(), "dns", PermStatus::Error);
        assert_eq!(overall_status(&permissions), TestStatus::Error);
    }

    #[test]
    fn test_missing_optional_is_warning() {
        for key in ["zone_settings", "email_routing", "firewall", "workers_routes", "analytics", "redirects"] {
            let permissions = with_status(all_ok(), key, PermStatus::Missing);
            assert_eq!(overall_status(&permissions), TestStatus::Warning, "{}", key);
        }
    }

    #[test]
    fn test_errored_optional_is_not_a_warning() {
        let permissions = with_status(all_ok(), "redirects", PermStatus::Error);
        assert_eq!(overall_status(&permissions), TestStatus::Ok);
    }

    #[test]
    fn test_cf_permission_only_when_unconfirmed() {
        assert_eq!(perm(&DNS, PermStatus::Ok).cf_permission, None);
        assert_eq!(
            perm(&DNS, PermStatus::Missing).cf_permission.as_deref(),
            Some("Zone → DNS → Edit")
        );
        assert!(perm(&CACHE, PermStatus::Unverified).cf_permission.is_some());
    }

    #[test]
    fn test_zone_list_failure_still_reports_cache() {
        let report = PermissionProber::zone_list_failed("Invalid API Token".to_string());

        assert_eq!(report.status, TestStatus::Error);
        assert_eq!(report.permission("zones").unwrap().note.as_deref(), Some("Invalid API Token"));
        assert_eq!(report.permission("cache").unwrap().status, PermStatus::Unverified);
    }

    #[test]
    fn test_permission_serializes_camel_case() {
        let json = serde_json::to_value(perm(&DNS, PermStatus::Missing)).unwrap();
        assert_eq!(json["key"], "dns");
        assert_eq!(json["status"], "missing");
        assert_eq!(json["cfPermission"], "Zone → DNS → Edit");
        assert!(json.get("note").is_none());
    }
}
