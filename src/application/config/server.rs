use std::env;

use super::parse_list;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, parsed from `CF_ADMIN_ALLOWED_ORIGINS` (comma-separated).
    /// When empty, any origin is allowed (dev convenience).
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("CF_ADMIN_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("CF_ADMIN_API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            allowed_origins: parse_list(&env::var("CF_ADMIN_ALLOWED_ORIGINS").unwrap_or_default()),
        }
    }
}
