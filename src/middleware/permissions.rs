//! Role-based authorization extractors
//!
//! Usage in handlers:
//! ```ignore
//! use crate::middleware::permissions::{Authorized, AdminManage};
//!
//! async fn list_users(
//!     Authorized(user, _): Authorized<AdminManage>,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Vec<User>>> {
//!     // Role already verified
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::user::{self, Role};
use crate::services::token_resolver::SessionUser;

/// Trait for permission marker types
pub trait Permission: Send + Sync + 'static {
    /// Name used in denial messages
    const NAME: &'static str;
    /// Roles that hold this permission
    const ROLES: &'static [Role];
}

/// Creates zero-sized marker types that implement `Permission`
macro_rules! define_permissions {
    ($($(#[$meta:meta])* $name:ident => $perm:expr, [$($role:ident),+]),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl Permission for $name {
                const NAME: &'static str = $perm;
                const ROLES: &'static [Role] = &[$(Role::$role),+];
            }
        )*
    };
}

define_permissions! {
    /// Read zones, DNS and zone configuration of reachable accounts
    CloudflareView => "cloudflare.view", [Admin, Viewer],
    /// Mutate DNS and zone configuration
    CloudflareManage => "cloudflare.manage", [Admin],
    /// Manage users, Cloudflare accounts, bindings and webhooks
    AdminManage => "admin.manage", [Admin],
    /// Read the audit log
    AuditView => "audit.view", [Admin],
}

/// Extractor that requires a specific permission
///
/// Returns 403 Forbidden when the caller's role does not hold `P`.
#[derive(Debug, Clone)]
pub struct Authorized<P: Permission>(pub user::Model, pub PhantomData<P>);

impl<P: Permission> Authorized<P> {
    /// Get the authenticated user
    pub fn user(&self) -> &user::Model {
        &self.0
    }

    pub fn user_id(&self) -> &str {
        &self.0.id
    }

    pub fn session(&self) -> SessionUser {
        SessionUser::from(&self.0)
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: Permission,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        if !P::ROLES.contains(&auth_user.0.role) {
            return Err(AppError::Forbidden(format!(
                "Permission denied: {} required",
                P::NAME
            )));
        }

        Ok(Authorized(auth_user.0.clone(), PhantomData))
    }
}

/// Extractor for any authenticated user (no specific permission required)
#[derive(Debug, Clone)]
pub struct Authenticated(pub user::Model);

impl Authenticated {
    pub fn user(&self) -> &user::Model {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        Ok(Authenticated(auth_user.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_can_only_view() {
        assert!(CloudflareView::ROLES.contains(&Role::Viewer));
        assert!(!CloudflareManage::ROLES.contains(&Role::Viewer));
        assert!(!AdminManage::ROLES.contains(&Role::Viewer));
        assert!(!AuditView::ROLES.contains(&Role::Viewer));
    }

    #[test]
    fn test_admin_holds_everything() {
        for roles in [
            CloudflareView::ROLES,
            CloudflareManage::ROLES,
            AdminManage::ROLES,
            AuditView::ROLES,
        ] {
            assert!(roles.contains(&Role::Admin));
        }
    }
}
