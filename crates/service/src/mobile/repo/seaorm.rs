use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use models::{mobile_api_key, mobile_device, provision_token, tenant};

use crate::mobile::domain::{
    ApiKeyRecord, DeviceRecord, DeviceStatus, KeyStatus, NewApiKey, NewProvisionToken, ProvisionRecord, ProvisionStatus, Redemption,
};
use crate::mobile::errors::MobileError;
use crate::mobile::repository::MobileRepository;

pub struct SeaOrmMobileRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmMobileRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn utc(t: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> { t.with_timezone(&Utc) }

fn to_key(m: mobile_api_key::Model) -> ApiKeyRecord {
    ApiKeyRecord {
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        prefix: m.prefix,
        key_hash: m.key_hash,
        status: m.status,
        created_at: utc(m.created_at),
        revoked_at: m.revoked_at.map(utc),
        last_used_at: m.last_used_at.map(utc),
    }
}

fn to_device(m: mobile_device::Model) -> DeviceRecord {
    DeviceRecord {
        id: m.id,
        tenant_id: m.tenant_id,
        api_key_id: m.api_key_id,
        name: m.name,
        status: m.status,
        active_event_id: m.active_event_id,
        last_seen_at: m.last_seen_at.map(utc),
        created_at: utc(m.created_at),
    }
}

fn to_token(m: provision_token::Model) -> ProvisionRecord {
    ProvisionRecord {
        id: m.id,
        tenant_id: m.tenant_id,
        prefix: m.prefix,
        token_hash: m.token_hash,
        plaintext: m.plaintext,
        status: m.status,
        expires_at: utc(m.expires_at),
        device_id: m.device_id,
        device_name: m.device_name,
        used_by_device_id: m.used_by_device_id,
        used_at: m.used_at.map(utc),
        created_at: utc(m.created_at),
    }
}

async fn scoped_key<C: sea_orm::ConnectionTrait>(db: &C, tenant_id: Uuid, id: Uuid) -> Result<Option<mobile_api_key::Model>, MobileError> {
    Ok(mobile_api_key::Entity::find_by_id(id).filter(mobile_api_key::Column::TenantId.eq(tenant_id)).one(db).await?)
}

async fn scoped_device<C: sea_orm::ConnectionTrait>(db: &C, tenant_id: Uuid, id: Uuid) -> Result<Option<mobile_device::Model>, MobileError> {
    Ok(mobile_device::Entity::find_by_id(id).filter(mobile_device::Column::TenantId.eq(tenant_id)).one(db).await?)
}

async fn scoped_token<C: sea_orm::ConnectionTrait>(db: &C, tenant_id: Uuid, id: Uuid) -> Result<Option<provision_token::Model>, MobileError> {
    Ok(provision_token::Entity::find_by_id(id).filter(provision_token::Column::TenantId.eq(tenant_id)).one(db).await?)
}

/// Disable every device bound to `key_id`, optionally unbinding it.
async fn disable_devices_of_key<C: sea_orm::ConnectionTrait>(db: &C, key_id: Uuid, unbind: bool) -> Result<(), MobileError> {
    let mut q = mobile_device::Entity::update_many()
        .col_expr(mobile_device::Column::Status, Expr::value(DeviceStatus::Disabled.to_value()));
    if unbind {
        q = q.col_expr(mobile_device::Column::ApiKeyId, Expr::value(Option::<Uuid>::None));
    }
    q.filter(mobile_device::Column::ApiKeyId.eq(key_id)).exec(db).await?;
    Ok(())
}

#[async_trait]
impl MobileRepository for SeaOrmMobileRepository {
    async fn tenant_slug(&self, tenant_id: Uuid) -> Result<Option<String>, MobileError> {
        Ok(tenant::Entity::find_by_id(tenant_id).one(&self.db).await?.map(|t| t.slug))
    }

    async fn tenant_id_by_slug(&self, slug: &str) -> Result<Option<Uuid>, MobileError> {
        Ok(tenant::find_by_slug(&self.db, slug).await?.map(|t| t.id))
    }

    async fn create_key(&self, key: NewApiKey, device_name: Option<String>) -> Result<(ApiKeyRecord, Option<DeviceRecord>), MobileError> {
        let txn = self.db.begin().await?;
        let now = key.created_at.into();
        let created = mobile_api_key::create(&txn, key.id, key.tenant_id, &key.name, &key.prefix, &key.key_hash, now).await?;
        let device = match device_name {
            Some(name) => Some(mobile_device::create(&txn, key.tenant_id, Some(created.id), &name, now).await?),
            None => None,
        };
        txn.commit().await?;
        Ok((to_key(created), device.map(to_device)))
    }

    async fn find_active_keys_by_prefix(&self, prefix: &str, limit: u64) -> Result<Vec<ApiKeyRecord>, MobileError> {
        let rows = mobile_api_key::Entity::find()
            .filter(mobile_api_key::Column::Prefix.eq(prefix))
            .filter(mobile_api_key::Column::Status.eq(KeyStatus::Active))
            .order_by_desc(mobile_api_key::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_key).collect())
    }

    async fn find_device_for_key(&self, key_id: Uuid) -> Result<Option<DeviceRecord>, MobileError> {
        let d = mobile_device::Entity::find().filter(mobile_device::Column::ApiKeyId.eq(key_id)).one(&self.db).await?;
        Ok(d.map(to_device))
    }

    async fn touch(&self, key_id: Uuid, device_id: Uuid, now: DateTime<Utc>) -> Result<(), MobileError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        mobile_api_key::Entity::update_many()
            .col_expr(mobile_api_key::Column::LastUsedAt, Expr::value(now))
            .filter(mobile_api_key::Column::Id.eq(key_id))
            .exec(&self.db)
            .await?;
        mobile_device::Entity::update_many()
            .col_expr(mobile_device::Column::LastSeenAt, Expr::value(now))
            .filter(mobile_device::Column::Id.eq(device_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyRecord>, MobileError> {
        let rows = mobile_api_key::Entity::find()
            .filter(mobile_api_key::Column::TenantId.eq(tenant_id))
            .order_by_desc(mobile_api_key::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_key).collect())
    }

    async fn revoke_key(&self, tenant_id: Uuid, key_id: Uuid, now: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, MobileError> {
        let txn = self.db.begin().await?;
        let Some(key) = scoped_key(&txn, tenant_id, key_id).await? else { return Ok(None) };
        let key = if key.status == KeyStatus::Active {
            let mut am: mobile_api_key::ActiveModel = key.into();
            am.status = Set(KeyStatus::Revoked);
            am.revoked_at = Set(Some(now.into()));
            am.update(&txn).await?
        } else {
            key
        };
        disable_devices_of_key(&txn, key_id, false).await?;
        txn.commit().await?;
        Ok(Some(to_key(key)))
    }

    async fn delete_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<bool, MobileError> {
        let txn = self.db.begin().await?;
        if scoped_key(&txn, tenant_id, key_id).await?.is_none() {
            return Ok(false);
        }
        disable_devices_of_key(&txn, key_id, true).await?;
        mobile_api_key::Entity::delete_by_id(key_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<DeviceRecord>, MobileError> {
        let rows = mobile_device::Entity::find()
            .filter(mobile_device::Column::TenantId.eq(tenant_id))
            .order_by_desc(mobile_device::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_device).collect())
    }

    async fn get_device(&self, tenant_id: Uuid, device_id: Uuid) -> Result<Option<DeviceRecord>, MobileError> {
        Ok(scoped_device(&self.db, tenant_id, device_id).await?.map(to_device))
    }

    async fn set_active_event(&self, tenant_id: Uuid, device_id: Uuid, event_id: Option<Uuid>) -> Result<Option<DeviceRecord>, MobileError> {
        let Some(device) = scoped_device(&self.db, tenant_id, device_id).await? else { return Ok(None) };
        let mut am: mobile_device::ActiveModel = device.into();
        am.active_event_id = Set(event_id);
        Ok(Some(to_device(am.update(&self.db).await?)))
    }

    async fn insert_provision_token(&self, t: NewProvisionToken) -> Result<ProvisionRecord, MobileError> {
        let am = provision_token::ActiveModel {
            id: Set(t.id),
            tenant_id: Set(t.tenant_id),
            prefix: Set(t.prefix),
            token_hash: Set(t.token_hash),
            plaintext: Set(Some(t.plaintext)),
            status: Set(ProvisionStatus::Active),
            expires_at: Set(t.expires_at.into()),
            device_id: Set(t.device_id),
            device_name: Set(t.device_name),
            used_by_device_id: Set(None),
            used_at: Set(None),
            created_at: Set(t.created_at.into()),
        };
        Ok(to_token(am.insert(&self.db).await?))
    }

    async fn list_provision_tokens(&self, tenant_id: Uuid) -> Result<Vec<ProvisionRecord>, MobileError> {
        let rows = provision_token::Entity::find()
            .filter(provision_token::Column::TenantId.eq(tenant_id))
            .order_by_desc(provision_token::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_token).collect())
    }

    async fn acknowledge_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError> {
        let Some(t) = scoped_token(&self.db, tenant_id, id).await? else { return Ok(None) };
        let mut am: provision_token::ActiveModel = t.into();
        am.plaintext = Set(None);
        Ok(Some(to_token(am.update(&self.db).await?)))
    }

    async fn revoke_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError> {
        let Some(t) = scoped_token(&self.db, tenant_id, id).await? else { return Ok(None) };
        let was_active = t.status == ProvisionStatus::Active;
        let mut am: provision_token::ActiveModel = t.into();
        if was_active {
            am.status = Set(ProvisionStatus::Revoked);
        }
        am.plaintext = Set(None);
        Ok(Some(to_token(am.update(&self.db).await?)))
    }

    async fn redeem_provision_token(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
        new_key: NewApiKey,
    ) -> Result<Option<Redemption>, MobileError> {
        let now_tz: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        let txn = self.db.begin().await?;

        let Some(token) = provision_token::Entity::find()
            .filter(provision_token::Column::TenantId.eq(tenant_id))
            .filter(provision_token::Column::TokenHash.eq(token_hash))
            .filter(provision_token::Column::Status.eq(ProvisionStatus::Active))
            .filter(provision_token::Column::ExpiresAt.gt(now_tz))
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        // Claim the token. A concurrent redeemer blocks on the row lock and
        // then sees zero rows affected.
        let claimed = provision_token::Entity::update_many()
            .col_expr(provision_token::Column::Status, Expr::value(ProvisionStatus::Used.to_value()))
            .col_expr(provision_token::Column::Plaintext, Expr::value(Option::<String>::None))
            .col_expr(provision_token::Column::UsedAt, Expr::value(now_tz))
            .filter(provision_token::Column::Id.eq(token.id))
            .filter(provision_token::Column::Status.eq(ProvisionStatus::Active))
            .exec(&txn)
            .await?;
        if claimed.rows_affected != 1 {
            return Ok(None);
        }

        // Lock the pre-bound device so a second code for the same device
        // waits here and then sees this redemption's key as the one to revoke.
        let prebound = match token.device_id {
            Some(id) => match mobile_device::Entity::find_by_id(id)
                .filter(mobile_device::Column::TenantId.eq(tenant_id))
                .lock_exclusive()
                .one(&txn)
                .await?
            {
                Some(d) => Some(d),
                None => return Ok(None),
            },
            None => None,
        };

        let key = mobile_api_key::create(&txn, new_key.id, tenant_id, &new_key.name, &new_key.prefix, &new_key.key_hash, new_key.created_at.into()).await?;

        let (device, old_key_id) = match prebound {
            Some(d) => {
                let old = d.api_key_id;
                let mut am: mobile_device::ActiveModel = d.into();
                am.api_key_id = Set(Some(key.id));
                am.status = Set(DeviceStatus::Active);
                (am.update(&txn).await?, old)
            }
            None => {
                let name = token.device_name.clone().unwrap_or_else(|| "Device".to_string());
                (mobile_device::create(&txn, tenant_id, Some(key.id), &name, now_tz).await?, None)
            }
        };

        let mut revoked_key_id = None;
        if let Some(old_id) = old_key_id {
            mobile_api_key::Entity::update_many()
                .col_expr(mobile_api_key::Column::Status, Expr::value(KeyStatus::Revoked.to_value()))
                .col_expr(mobile_api_key::Column::RevokedAt, Expr::value(now_tz))
                .filter(mobile_api_key::Column::Id.eq(old_id))
                .filter(mobile_api_key::Column::Status.eq(KeyStatus::Active))
                .exec(&txn)
                .await?;
            revoked_key_id = Some(old_id);
        }

        provision_token::Entity::update_many()
            .col_expr(provision_token::Column::UsedByDeviceId, Expr::value(Some(device.id)))
            .filter(provision_token::Column::Id.eq(token.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(Some(Redemption { key: to_key(key), device: to_device(device), revoked_key_id }))
    }

    async fn purge_expired_provision_tokens(&self, now: DateTime<Utc>) -> Result<u64, MobileError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        let res = provision_token::Entity::delete_many()
            .filter(provision_token::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}
