use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users: index on tenant_id
        manager
            .create_index(
                Index::create()
                    .name("idx_user_tenant")
                    .table(User::Table)
                    .col(User::TenantId)
                    .to_owned(),
            )
            .await?;

        // MobileApiKey: candidate lookup by (prefix, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_mobile_api_key_prefix_status")
                    .table(MobileApiKey::Table)
                    .col(MobileApiKey::Prefix)
                    .col(MobileApiKey::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_mobile_api_key_tenant")
                    .table(MobileApiKey::Table)
                    .col(MobileApiKey::TenantId)
                    .to_owned(),
            )
            .await?;

        // MobileDevice: index on tenant_id
        manager
            .create_index(
                Index::create()
                    .name("idx_mobile_device_tenant")
                    .table(MobileDevice::Table)
                    .col(MobileDevice::TenantId)
                    .to_owned(),
            )
            .await?;

        // ProvisionToken: redemption lookup by (tenant_id, token_hash)
        manager
            .create_index(
                Index::create()
                    .name("idx_provision_token_tenant_hash")
                    .table(ProvisionToken::Table)
                    .col(ProvisionToken::TenantId)
                    .col(ProvisionToken::TokenHash)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_user_tenant").table(User::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_mobile_api_key_prefix_status").table(MobileApiKey::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_mobile_api_key_tenant").table(MobileApiKey::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_mobile_device_tenant").table(MobileDevice::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_provision_token_tenant_hash").table(ProvisionToken::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum User { Table, TenantId }

#[derive(DeriveIden)]
enum MobileApiKey { Table, TenantId, Prefix, Status }

#[derive(DeriveIden)]
enum MobileDevice { Table, TenantId }

#[derive(DeriveIden)]
enum ProvisionToken { Table, TenantId, TokenHash }
