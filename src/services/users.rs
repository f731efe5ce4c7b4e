//! User administration rules
//!
//! Holds the invariants that span rows: at least one ADMIN must remain, the
//! protected admin account is immutable, and account bindings are replaced
//! as a whole inside one transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::config::auth::AuthConfig;
use crate::db::DbConn;
use crate::error::{AppError, Result};
use crate::models::prelude::*;
use crate::models::{user, user_cf_account};
use crate::services::security::hash_password;

pub const MIN_PASSWORD_LEN: u64 = 8;

const LAST_ADMIN_MESSAGE: &str = "The system must keep at least one admin";

/// Canonical form for stored and compared emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Role,
}

pub async fn find_user(db: &impl ConnectionTrait, user_id: &str) -> Result<user::Model> {
    User::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn find_by_email(db: &DbConn, email: &str) -> Result<Option<user::Model>> {
    Ok(User::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

async fn count_admins(db: &impl ConnectionTrait) -> Result<u64> {
    Ok(User::find()
        .filter(user::Column::Role.eq(Role::Admin))
        .count(db)
        .await?)
}

fn ensure_not_protected(auth: &AuthConfig, target: &user::Model) -> Result<()> {
    if auth.is_protected_email(&target.email) {
        return Err(AppError::Forbidden(
            "This account is protected and cannot be modified".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_user(db: &DbConn, new_user: NewUser) -> Result<user::Model> {
    let email = normalize_email(&new_user.email);
    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let created = user::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        email: Set(email),
        password_hash: Set(hash_password(&new_user.password)?),
        name: Set(new_user.name.filter(|n| !n.trim().is_empty())),
        role: Set(new_user.role),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    tracing::info!("Created user {} with role {}", created.email, created.role);
    Ok(created)
}

pub async fn list_users(db: &DbConn) -> Result<Vec<user::Model>> {
    Ok(User::find()
        .order_by_asc(user::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Change a user's role, refusing to demote the last ADMIN
pub async fn change_role(db: &DbConn, auth: &AuthConfig, user_id: &str, role: Role) -> Result<user::Model> {
    let txn = db.begin().await?;
    let target = find_user(&txn, user_id).await?;
    ensure_not_protected(auth, &target)?;

    if target.role == Role::Admin && role != Role::Admin && count_admins(&txn).await? <= 1 {
        return Err(AppError::Validation(LAST_ADMIN_MESSAGE.to_string()));
    }

    let mut active: user::ActiveModel = target.into();
    active.role = Set(role);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(updated)
}

/// Delete a user; the caller may not delete themselves or the last ADMIN
pub async fn delete_user(db: &DbConn, auth: &AuthConfig, acting_user_id: &str, user_id: &str) -> Result<()> {
    if acting_user_id == user_id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    let txn = db.begin().await?;
    let target = find_user(&txn, user_id).await?;
    ensure_not_protected(auth, &target)?;

    if target.role == Role::Admin && count_admins(&txn).await? <= 1 {
        return Err(AppError::Validation(LAST_ADMIN_MESSAGE.to_string()));
    }

    User::delete_by_id(target.id.clone()).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("Deleted user {}", target.email);
    Ok(())
}

/// Replace a user's password hash (admin reset or self-service change)
pub async fn set_password(db: &DbConn, auth: &AuthConfig, user_id: &str, new_password: &str) -> Result<()> {
    let target = find_user(db, user_id).await?;
    ensure_not_protected(auth, &target)?;

    let mut active: user::ActiveModel = target.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.update(db).await?;
    Ok(())
}

/// Ids of the Cloudflare accounts bound to a user
pub async fn bound_account_ids(db: &impl ConnectionTrait, user_id: &str) -> Result<Vec<String>> {
    Ok(UserCfAccount::find()
        .filter(user_cf_account::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|b| b.cf_account_id)
        .collect())
}

/// Replace all bindings of a user with `account_ids` atomically.
///
/// Either every id is bound afterwards or the previous set is left intact.
pub async fn replace_bindings(db: &DbConn, user_id: &str, account_ids: &[String]) -> Result<Vec<String>> {
    let mut wanted: Vec<String> = Vec::with_capacity(account_ids.len());
    for id in account_ids {
        if !wanted.contains(id) {
            wanted.push(id.clone());
        }
    }

    let txn = db.begin().await?;
    find_user(&txn, user_id).await?;

    UserCfAccount::delete_many()
        .filter(user_cf_account::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    for account_id in &wanted {
        if CfAccount::find_by_id(account_id.clone()).one(&txn).await?.is_none() {
            txn.rollback().await?;
            return Err(AppError::Validation(format!(
                "Cloudflare account {} does not exist",
                account_id
            )));
        }

        user_cf_account::ActiveModel {
            user_id: Set(user_id.to_string()),
            cf_account_id: Set(account_id.clone()),
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(wanted)
}
