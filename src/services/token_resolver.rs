//! Maps a caller and an optional account selection to a usable API token.
//!
//! This is the single place where account-level access control is decided:
//! ADMIN may use any account or the configured fallback token, VIEWER only
//! accounts bound to them and never the fallback.

use sea_orm::{DbErr, EntityTrait};
use thiserror::Error;

use crate::db::DbConn;
use crate::models::prelude::*;
use crate::models::user;
use crate::services::token_cipher::TokenCipher;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{0}")]
    Configuration(String),

    #[error("You do not have access to this Cloudflare account")]
    AccessDenied,

    #[error("Cloudflare account not found")]
    AccountNotFound,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// The parts of a session the resolver needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
    pub role: Role,
}

impl From<&user::Model> for SessionUser {
    fn from(user: &user::Model) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
        }
    }
}

#[derive(Clone)]
pub struct TokenResolver {
    db: DbConn,
    cipher: TokenCipher,
    fallback_token: Option<String>,
}

impl TokenResolver {
    pub fn new(db: DbConn, cipher: TokenCipher, fallback_token: Option<String>) -> Self {
        Self {
            db,
            cipher,
            fallback_token: fallback_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn cipher(&self) -> &TokenCipher {
        &self.cipher
    }

    /// Resolve the plaintext token for `requested_account_id` on behalf of `session`.
    ///
    /// `session` is `None` only in single-tenant mode, where it is treated like ADMIN.
    pub async fn resolve(
        &self,
        requested_account_id: Option<&str>,
        session: Option<&SessionUser>,
    ) -> Result<String, TokenError> {
        let is_viewer = session.is_some_and(|s| s.role == Role::Viewer);

        let Some(account_id) = requested_account_id.filter(|id| !id.is_empty()) else {
            if is_viewer {
                return Err(TokenError::AccessDenied);
            }
            return self.fallback_token.clone().ok_or_else(|| {
                TokenError::Configuration(
                    "No Cloudflare account selected and CLOUDFLARE_API_TOKEN is not configured"
                        .to_string(),
                )
            });
        };

        if let Some(session) = session.filter(|_| is_viewer) {
            let binding = UserCfAccount::find_by_id((session.user_id.clone(), account_id.to_string()))
                .one(&self.db)
                .await?;
            if binding.is_none() {
                return Err(TokenError::AccessDenied);
            }
        }

        let account = CfAccount::find_by_id(account_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(TokenError::AccountNotFound)?;

        self.cipher.decrypt(&account.encrypted_token).map_err(|e| {
            tracing::warn!("Stored token for account {} could not be decrypted: {}", account.id, e);
            TokenError::AccountNotFound
        })
    }
}
