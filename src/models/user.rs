use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Stored trimmed and lower-cased
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    #[schema(value_type = String)]
    pub created_at: DateTimeUtc,
}

/// Account role. ADMIN sees every Cloudflare account; VIEWER only bound ones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "VIEWER")]
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Viewer => write!(f, "VIEWER"),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_cf_account::Entity")]
    UserCfAccounts,
}

impl Related<super::cf_account::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_cf_account::Relation::CfAccount.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::user_cf_account::Relation::User.def().rev())
    }
}

impl Related<super::user_cf_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCfAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
