use std::env;
use std::time::Duration;

use super::{non_empty_var, parse_list};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Upstream Cloudflare API settings
#[derive(Clone)]
pub struct CloudflareConfig {
    pub api_base: String,
    /// Token used when no account is selected (single-tenant deployments)
    pub fallback_token: Option<String>,
    /// Zone names that reject every DNS write
    pub protected_zones: Vec<String>,
    pub request_timeout: Duration,
    /// Deadline for each individual permission probe
    pub probe_timeout: Duration,
}

impl CloudflareConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: non_empty_var("CLOUDFLARE_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            fallback_token: non_empty_var("CLOUDFLARE_API_TOKEN"),
            protected_zones: parse_list(&env::var("PROTECTED_ZONES").unwrap_or_default()),
            request_timeout: Duration::from_secs(
                env::var("CLOUDFLARE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            probe_timeout: Duration::from_secs(
                env::var("CLOUDFLARE_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            fallback_token: None,
            protected_zones: Vec::new(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_base", &self.api_base)
            .field("fallback_token", &self.fallback_token.as_ref().map(|_| "****"))
            .field("protected_zones", &self.protected_zones)
            .field("request_timeout", &self.request_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}
