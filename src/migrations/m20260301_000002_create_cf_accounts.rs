//! Migration: Create cf_accounts table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CfAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CfAccounts::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CfAccounts::Name).string().not_null())
                    .col(ColumnDef::new(CfAccounts::EncryptedToken).text().not_null())
                    .col(
                        ColumnDef::new(CfAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CfAccounts::LastTestAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(CfAccounts::LastTestStatus).string_len(16).null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CfAccounts::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
#[iden = "cf_accounts"]
pub enum CfAccounts {
    Table,
    Id,
    Name,
    #[iden = "encrypted_token"]
    EncryptedToken,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "last_test_at"]
    LastTestAt,
    #[iden = "last_test_status"]
    LastTestStatus,
}
