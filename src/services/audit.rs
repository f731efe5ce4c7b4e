use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::db::DbConn;
use crate::error::Result;
use crate::models::audit_log::{self, AuditAction};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 100;

/// A completed DNS mutation to be recorded
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: String,
    pub user_email: String,
    pub action: AuditAction,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub target: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// Audit service for recording DNS mutations
#[derive(Clone)]
pub struct AuditService {
    db: DbConn,
}

impl AuditService {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    /// Record an entry. Never fails: the mutation it describes has already
    /// happened upstream, so persistence errors are logged and dropped.
    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.insert(entry).await {
            tracing::error!("Failed to write audit log entry for {}: {}", action, e);
        }
    }

    async fn insert(&self, entry: AuditEntry) -> Result<()> {
        let log_entry = audit_log::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(entry.user_id),
            user_email: Set(entry.user_email),
            action: Set(entry.action.to_string()),
            zone_id: Set(entry.zone_id),
            zone_name: Set(entry.zone_name),
            target: Set(entry.target),
            before: Set(entry.before.map(|v| v.to_string())),
            after: Set(entry.after.map(|v| v.to_string())),
            created_at: Set(chrono::Utc::now()),
        };

        log_entry.insert(&self.db).await?;
        Ok(())
    }
}

/// Query parameters for fetching audit logs
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Substring match on the action name
    pub action: Option<String>,
    /// Case-insensitive substring match on the actor's email
    pub user_email: Option<String>,
    pub zone_id: Option<String>,
}

/// Audit log row with before/after decoded back to JSON
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub action: String,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub target: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<audit_log::Model> for AuditLogEntry {
    fn from(log: audit_log::Model) -> Self {
        let decode = |raw: Option<String>| {
            raw.map(|s| serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)))
        };
        Self {
            id: log.id,
            user_id: log.user_id,
            user_email: log.user_email,
            action: log.action,
            zone_id: log.zone_id,
            zone_name: log.zone_name,
            target: log.target,
            before: decode(log.before),
            after: decode(log.after),
            created_at: log.created_at,
        }
    }
}

/// Paginated audit log response
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogPage {
    pub result: Vec<AuditLogEntry>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Get audit logs with filtering and pagination, newest first
pub async fn get_audit_logs(db: &DbConn, query: AuditLogQuery) -> Result<AuditLogPage> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * page_size;

    let mut select = audit_log::Entity::find();

    if let Some(action) = query.action.as_deref().filter(|a| !a.is_empty()) {
        select = select.filter(audit_log::Column::Action.contains(action));
    }

    // Emails are stored lower-cased
    if let Some(email) = query.user_email.as_deref().filter(|e| !e.is_empty()) {
        select = select.filter(audit_log::Column::UserEmail.contains(email.to_lowercase()));
    }

    if let Some(zone_id) = query.zone_id.as_deref().filter(|z| !z.is_empty()) {
        select = select.filter(audit_log::Column::ZoneId.eq(zone_id));
    }

    let total = select.clone().count(db).await?;

    let logs = select
        .order_by_desc(audit_log::Column::CreatedAt)
        .offset(offset)
        .limit(page_size)
        .all(db)
        .await?;

    Ok(AuditLogPage {
        result: logs.into_iter().map(AuditLogEntry::from).collect(),
        total,
        page,
        page_size,
    })
}
