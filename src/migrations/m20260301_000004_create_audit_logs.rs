//! Migration: Create audit_logs table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    // No foreign key: entries outlive the users they name
                    .col(ColumnDef::new(AuditLogs::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(AuditLogs::UserEmail).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::ZoneId).string().null())
                    .col(ColumnDef::new(AuditLogs::ZoneName).string().null())
                    .col(ColumnDef::new(AuditLogs::Target).string().null())
                    .col(ColumnDef::new(AuditLogs::Before).text().null())
                    .col(ColumnDef::new(AuditLogs::After).text().null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_created_at")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_zone_id")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::ZoneId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
#[iden = "audit_logs"]
enum AuditLogs {
    Table,
    Id,
    #[iden = "user_id"]
    UserId,
    #[iden = "user_email"]
    UserEmail,
    Action,
    #[iden = "zone_id"]
    ZoneId,
    #[iden = "zone_name"]
    ZoneName,
    Target,
    Before,
    After,
    #[iden = "created_at"]
    CreatedAt,
}
