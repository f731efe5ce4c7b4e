use std::env;

use super::non_empty_var;

/// Session and account-administration settings
#[derive(Clone)]
pub struct AuthConfig {
    /// Process-wide secret: derives the token cipher key and signs sessions.
    pub secret: Option<String>,
    pub session_ttl_secs: i64,
    /// Set the `Secure` flag on the session cookie
    pub secure_cookies: bool,
    /// Account whose password, role and existence are locked
    pub protected_admin_email: Option<String>,
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            secret: non_empty_var("AUTH_SECRET"),
            session_ttl_secs: env::var("CF_ADMIN_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(604800),
            secure_cookies: env::var("CF_ADMIN_SECURE_COOKIES")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            protected_admin_email: non_empty_var("PROTECTED_ADMIN_EMAIL")
                .map(|e| e.trim().to_lowercase()),
            seed_admin_email: non_empty_var("SEED_ADMIN_EMAIL"),
            seed_admin_password: non_empty_var("SEED_ADMIN_PASSWORD"),
        }
    }

    /// Whether `email` is the configured protected admin
    pub fn is_protected_email(&self, email: &str) -> bool {
        self.protected_admin_email
            .as_deref()
            .is_some_and(|protected| protected.eq_ignore_ascii_case(email.trim()))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "****"))
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("secure_cookies", &self.secure_cookies)
            .field("protected_admin_email", &self.protected_admin_email)
            .field("seed_admin_email", &self.seed_admin_email)
            .finish_non_exhaustive()
    }
}
