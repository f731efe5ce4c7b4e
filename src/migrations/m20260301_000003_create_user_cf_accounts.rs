//! Migration: Create user_cf_accounts junction table

use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_users::Users;
use super::m20260301_000002_create_cf_accounts::CfAccounts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserCfAccounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserCfAccounts::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(UserCfAccounts::CfAccountId)
                            .string_len(36)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserCfAccounts::UserId)
                            .col(UserCfAccounts::CfAccountId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UserCfAccounts::Table, UserCfAccounts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UserCfAccounts::Table, UserCfAccounts::CfAccountId)
                            .to(CfAccounts::Table, CfAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_cf_accounts_cf_account_id")
                    .table(UserCfAccounts::Table)
                    .col(UserCfAccounts::CfAccountId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(UserCfAccounts::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
#[iden = "user_cf_accounts"]
enum UserCfAccounts {
    Table,
    #[iden = "user_id"]
    UserId,
    #[iden = "cf_account_id"]
    CfAccountId,
}
