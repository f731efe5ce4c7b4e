use std::sync::Arc;

use crate::config::Config;
use crate::db::DbConn;
use crate::error::Result;
use crate::services::{
    AuditService, CloudflareClient, PermissionProber, ProtectedZoneGuard, SessionSigner,
    TokenCipher, TokenResolver,
};

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DbConn,
    pub config: Arc<Config>,
    pub audit: AuditService,
    pub cloudflare: CloudflareClient,
    pub tokens: TokenResolver,
    pub prober: PermissionProber,
    pub zone_guard: ProtectedZoneGuard,
    pub sessions: SessionSigner,
}

impl AppState {
    pub fn new(db: DbConn, config: Config) -> Result<Self> {
        let cloudflare = CloudflareClient::new(&config.cloudflare)?;
        let cipher = TokenCipher::new(config.auth.secret.as_deref());
        if !cipher.is_configured() {
            tracing::warn!("AUTH_SECRET is not set; stored Cloudflare tokens cannot be used");
        }

        Ok(Self {
            audit: AuditService::new(db.clone()),
            tokens: TokenResolver::new(
                db.clone(),
                cipher,
                config.cloudflare.fallback_token.clone(),
            ),
            prober: PermissionProber::new(cloudflare.clone(), config.cloudflare.probe_timeout),
            zone_guard: ProtectedZoneGuard::new(
                cloudflare.clone(),
                &config.cloudflare.protected_zones,
            ),
            sessions: SessionSigner::new(
                config.auth.secret.clone(),
                config.auth.session_ttl_secs,
            ),
            cloudflare,
            config: Arc::new(config),
            db,
        })
    }
}
