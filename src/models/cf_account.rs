use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A Cloudflare account credential. The token is only ever stored encrypted
/// and is never serialized.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "cf_accounts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub encrypted_token: String,
    #[schema(value_type = String)]
    pub created_at: DateTimeUtc,
    #[schema(value_type = Option<String>)]
    pub last_test_at: Option<DateTimeUtc>,
    /// One of "ok", "warning", "error"
    pub last_test_status: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_cf_account::Entity")]
    UserCfAccounts,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_cf_account::Relation::User.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::user_cf_account::Relation::CfAccount.def().rev())
    }
}

impl Related<super::user_cf_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCfAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
