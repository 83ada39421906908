//! Create `mobile_device` table.
//!
//! `api_key_id` is unique: a key is held by at most one device.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MobileDevice::Table)
                    .if_not_exists()
                    .col(uuid(MobileDevice::Id).primary_key())
                    .col(uuid(MobileDevice::TenantId).not_null())
                    .col(uuid_null(MobileDevice::ApiKeyId).unique_key())
                    .col(string_len(MobileDevice::Name, 128).not_null())
                    .col(string_len(MobileDevice::Status, 16).not_null())
                    .col(uuid_null(MobileDevice::ActiveEventId))
                    .col(timestamp_with_time_zone_null(MobileDevice::LastSeenAt))
                    .col(timestamp_with_time_zone(MobileDevice::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mobile_device_tenant")
                            .from(MobileDevice::Table, MobileDevice::TenantId)
                            .to(Tenant::Table, Tenant::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mobile_device_api_key")
                            .from(MobileDevice::Table, MobileDevice::ApiKeyId)
                            .to(MobileApiKey::Table, MobileApiKey::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MobileDevice::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum MobileDevice { Table, Id, TenantId, ApiKeyId, Name, Status, ActiveEventId, LastSeenAt, CreatedAt }

#[derive(DeriveIden)]
enum Tenant { Table, Id }

#[derive(DeriveIden)]
enum MobileApiKey { Table, Id }
