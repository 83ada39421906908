//! Create `mobile_api_key` table.
//!
//! Only the keyed hash of the plaintext is stored; `prefix` narrows the
//! candidate set during authentication.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MobileApiKey::Table)
                    .if_not_exists()
                    .col(uuid(MobileApiKey::Id).primary_key())
                    .col(uuid(MobileApiKey::TenantId).not_null())
                    .col(string_len(MobileApiKey::Name, 128).not_null())
                    .col(string_len(MobileApiKey::Prefix, 16).not_null())
                    .col(string_len(MobileApiKey::KeyHash, 64).unique_key().not_null())
                    .col(string_len(MobileApiKey::Status, 16).not_null())
                    .col(timestamp_with_time_zone(MobileApiKey::CreatedAt).not_null())
                    .col(timestamp_with_time_zone_null(MobileApiKey::RevokedAt))
                    .col(timestamp_with_time_zone_null(MobileApiKey::LastUsedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mobile_api_key_tenant")
                            .from(MobileApiKey::Table, MobileApiKey::TenantId)
                            .to(Tenant::Table, Tenant::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MobileApiKey::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum MobileApiKey { Table, Id, TenantId, Name, Prefix, KeyHash, Status, CreatedAt, RevokedAt, LastUsedAt }

#[derive(DeriveIden)]
enum Tenant { Table, Id }
