//! First-run setup: seed the initial admin from the environment

use sea_orm::{EntityTrait, PaginatorTrait};

use crate::config::auth::AuthConfig;
use crate::db::DbConn;
use crate::error::Result;
use crate::models::prelude::*;
use crate::models::user;
use crate::services::users::{create_user, NewUser};

/// Create the first ADMIN from `SEED_ADMIN_EMAIL`/`SEED_ADMIN_PASSWORD`.
///
/// Only runs against an empty users table; returns the created user if any.
pub async fn seed_admin(db: &DbConn, auth: &AuthConfig) -> Result<Option<user::Model>> {
    let existing = User::find().count(db).await?;
    if existing > 0 {
        tracing::debug!("Users already exist, skipping admin seed");
        return Ok(None);
    }

    let (Some(email), Some(password)) = (&auth.seed_admin_email, &auth.seed_admin_password) else {
        tracing::warn!(
            "No users exist and SEED_ADMIN_EMAIL/SEED_ADMIN_PASSWORD are not set; nobody can log in"
        );
        return Ok(None);
    };

    let admin = create_user(
        db,
        NewUser {
            email: email.clone(),
            password: password.clone(),
            name: Some("Administrator".to_string()),
            role: Role::Admin,
        },
    )
    .await?;

    tracing::info!("Seeded initial admin {}", admin.email);
    Ok(Some(admin))
}
