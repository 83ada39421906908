//! Database-backed model tests. They run only when `DATABASE_URL` points at a
//! Postgres instance and `SKIP_DB_TESTS` is unset.

use crate::db::connect_from_env;
use crate::{mobile_api_key, mobile_device, provision_token, tenant, user, user_credentials};
use anyhow::Result;
use chrono::{Duration, Utc};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn setup_test_db() -> Result<Option<DatabaseConnection>> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(None);
    }
    let Some(db) = connect_from_env().await? else { return Ok(None) };
    migration::Migrator::up(&db, None).await?;
    Ok(Some(db))
}

fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn tenant_and_user_crud() -> Result<()> {
    let Some(db) = setup_test_db().await? else { return Ok(()) };

    let slug = unique_slug("crud");
    let t = tenant::create(&db, &slug, "Crud Tenant").await?;
    assert_eq!(tenant::find_by_slug(&db, &slug).await?.map(|x| x.id), Some(t.id));

    let email = format!("Owner+{}@Example.test", Uuid::new_v4().simple());
    let u = user::create(&db, Some(t.id), &email, user::UserRole::TenantOwner).await?;
    assert_eq!(u.email, user::normalize_email(&email));
    assert_eq!(user::find_by_email(&db, &email).await?.map(|x| x.id), Some(u.id));

    // duplicate email violates the unique index
    assert!(user::create(&db, Some(t.id), &email, user::UserRole::Admin).await.is_err());

    user_credentials::upsert_password(&db, u.id, "h1".into(), "argon2id").await?;
    let c = user_credentials::upsert_password(&db, u.id, "h2".into(), "argon2id").await?;
    assert_eq!(c.password_hash, "h2");

    user::touch_last_login(&db, u.id).await?;
    let reloaded = user::Entity::find_by_id(u.id).one(&db).await?;
    assert!(reloaded.and_then(|r| r.last_login_at).is_some());

    user_credentials::Entity::delete_many().filter(user_credentials::Column::UserId.eq(u.id)).exec(&db).await?;
    user::Entity::delete_by_id(u.id).exec(&db).await?;
    tenant::Entity::delete_by_id(t.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn registry_rows_are_linked() -> Result<()> {
    let Some(db) = setup_test_db().await? else { return Ok(()) };

    let t = tenant::create(&db, &unique_slug("reg"), "Registry Tenant").await?;
    let now = Utc::now().into();
    let key = mobile_api_key::create(&db, Uuid::new_v4(), t.id, "Gate 1", "abcd1234", &"f".repeat(64), now).await?;
    assert_eq!(key.status, mobile_api_key::KeyStatus::Active);

    let dev = mobile_device::create(&db, t.id, Some(key.id), "Gate 1", now).await?;
    // api_key_id is unique: a second device cannot share the key
    assert!(mobile_device::create(&db, t.id, Some(key.id), "Gate 2", now).await.is_err());

    let tok = provision_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(t.id),
        prefix: Set("ABCD".into()),
        token_hash: Set("e".repeat(64)),
        plaintext: Set(Some("ABCD-EFGH-JKMN".into())),
        status: Set(provision_token::ProvisionStatus::Active),
        expires_at: Set((Utc::now() + Duration::minutes(15)).into()),
        device_id: Set(Some(dev.id)),
        device_name: Set(None),
        used_by_device_id: Set(None),
        used_at: Set(None),
        created_at: Set(now),
    }
    .insert(&db)
    .await?;

    let scoped = mobile_device::Entity::find()
        .filter(mobile_device::Column::Id.eq(dev.id))
        .filter(mobile_device::Column::TenantId.eq(Uuid::new_v4()))
        .one(&db)
        .await?;
    assert!(scoped.is_none(), "lookup with a foreign tenant id must miss");

    provision_token::Entity::delete_by_id(tok.id).exec(&db).await?;
    mobile_device::Entity::delete_by_id(dev.id).exec(&db).await?;
    mobile_api_key::Entity::delete_by_id(key.id).exec(&db).await?;
    tenant::Entity::delete_by_id(t.id).exec(&db).await?;
    Ok(())
}

#[test]
fn validation_rejects_bad_input() {
    assert!(mobile_device::validate_name("   ").is_err());
    assert!(tenant::validate_slug("ok-slug").is_ok());
}
