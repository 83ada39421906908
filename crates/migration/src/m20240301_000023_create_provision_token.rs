//! Create `provision_token` table: short-lived, single-use codes a device
//! exchanges for an API key.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProvisionToken::Table)
                    .if_not_exists()
                    .col(uuid(ProvisionToken::Id).primary_key())
                    .col(uuid(ProvisionToken::TenantId).not_null())
                    .col(string_len(ProvisionToken::Prefix, 16).not_null())
                    .col(string_len(ProvisionToken::TokenHash, 64).unique_key().not_null())
                    // Plaintext survives only until displayed or redeemed.
                    .col(string_len_null(ProvisionToken::Plaintext, 64))
                    .col(string_len(ProvisionToken::Status, 16).not_null())
                    .col(timestamp_with_time_zone(ProvisionToken::ExpiresAt).not_null())
                    .col(uuid_null(ProvisionToken::DeviceId))
                    .col(string_len_null(ProvisionToken::DeviceName, 128))
                    .col(uuid_null(ProvisionToken::UsedByDeviceId))
                    .col(timestamp_with_time_zone_null(ProvisionToken::UsedAt))
                    .col(timestamp_with_time_zone(ProvisionToken::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provision_token_tenant")
                            .from(ProvisionToken::Table, ProvisionToken::TenantId)
                            .to(Tenant::Table, Tenant::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provision_token_device")
                            .from(ProvisionToken::Table, ProvisionToken::DeviceId)
                            .to(MobileDevice::Table, MobileDevice::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ProvisionToken::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ProvisionToken {
    Table,
    Id,
    TenantId,
    Prefix,
    TokenHash,
    Plaintext,
    Status,
    ExpiresAt,
    DeviceId,
    DeviceName,
    UsedByDeviceId,
    UsedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenant { Table, Id }

#[derive(DeriveIden)]
enum MobileDevice { Table, Id }
