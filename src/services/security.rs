use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::user;

pub const SESSION_COOKIE_NAME: &str = "cf_admin_session";

/// bcrypt work factor for stored passwords
const PASSWORD_COST: u32 = 12;

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub email: String,
    pub role: user::Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, PASSWORD_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issues and verifies HS256 session tokens signed with `AUTH_SECRET`
#[derive(Clone)]
pub struct SessionSigner {
    secret: Option<String>,
    ttl_secs: i64,
}

impl SessionSigner {
    pub fn new(secret: Option<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn secret(&self) -> Result<&[u8]> {
        self.secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or_else(|| AppError::Configuration("AUTH_SECRET is not configured".to_string()))
    }

    pub fn issue(&self, user: &user::Model) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + Duration::seconds(self.ttl_secs)).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret()?),
        )?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret()?),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("configured", &self.secret.is_some())
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}
