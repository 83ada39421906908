//! Create `user` table with FK to `tenant`.
//!
//! `tenant_id` is nullable only for accounts that have not finished
//! onboarding. Email is globally unique.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(uuid_null(User::TenantId))
                    .col(string_len(User::Email, 255).unique_key().not_null())
                    .col(string_len(User::Role, 32).not_null())
                    .col(boolean(User::EmailVerified).not_null().default(false))
                    .col(timestamp_with_time_zone_null(User::LastLoginAt))
                    .col(timestamp_with_time_zone(User::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(User::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tenant")
                            .from(User::Table, User::TenantId)
                            .to(Tenant::Table, Tenant::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum User { Table, Id, TenantId, Email, Role, EmailVerified, LastLoginAt, CreatedAt, UpdatedAt }

#[derive(DeriveIden)]
enum Tenant { Table, Id }
