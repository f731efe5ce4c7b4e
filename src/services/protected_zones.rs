//! Deny-list check applied before every DNS write
//!
//! Zone names are compared exactly (case-sensitive). When a deny-list is
//! configured and the zone cannot be looked up, the write is refused.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::cloudflare::CloudflareClient;

#[derive(Clone, Debug)]
pub struct ProtectedZoneGuard {
    client: CloudflareClient,
    protected: Arc<HashSet<String>>,
}

impl ProtectedZoneGuard {
    pub fn new(client: CloudflareClient, protected_zones: &[String]) -> Self {
        Self {
            client,
            protected: Arc::new(protected_zones.iter().cloned().collect()),
        }
    }

    pub fn is_protected(&self, zone_name: &str) -> bool {
        self.protected.contains(zone_name)
    }

    /// Reject writes to protected zones; returns the zone name when known.
    ///
    /// With an empty deny-list the name is still looked up for audit purposes,
    /// but a failed lookup does not block the write.
    pub async fn check(&self, token: &str, zone_id: &str) -> Result<Option<String>> {
        let lookup = self.client.get_zone(token, zone_id).await;

        if self.protected.is_empty() {
            return Ok(match lookup {
                Ok(zone) => Some(zone.name),
                Err(e) => {
                    tracing::warn!("Zone lookup for {} failed: {}", zone_id, e);
                    None
                }
            });
        }

        let zone = lookup.map_err(|e| {
            tracing::warn!("Refusing DNS write, zone {} could not be verified: {}", zone_id, e);
            e
        })?;

        if self.is_protected(&zone.name) {
            tracing::info!("Blocked DNS write to protected zone {}", zone.name);
            return Err(AppError::Forbidden(format!(
                "Zone {} is protected and cannot be modified",
                zone.name
            )));
        }

        Ok(Some(zone.name))
    }
}
