use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only record of a successful DNS mutation
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "audit_logs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    /// Snapshot of the email at the time of the action
    pub user_email: String,
    pub action: String,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub target: Option<String>,
    pub before: Option<String>, // JSON string
    pub after: Option<String>,  // JSON string
    #[schema(value_type = String)]
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    DnsCreate,
    DnsUpdate,
    DnsDelete,
    DnsBatchDelete,
    DnsImport,
}

impl AuditAction {
    pub const ALL: [AuditAction; 5] = [
        AuditAction::DnsCreate,
        AuditAction::DnsUpdate,
        AuditAction::DnsDelete,
        AuditAction::DnsBatchDelete,
        AuditAction::DnsImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DnsCreate => "dns.create",
            AuditAction::DnsUpdate => "dns.update",
            AuditAction::DnsDelete => "dns.delete",
            AuditAction::DnsBatchDelete => "dns.batch_delete",
            AuditAction::DnsImport => "dns.import",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == value)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
