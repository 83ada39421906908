use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use uuid::Uuid;

use models::errors::ModelError;

use crate::auth::domain::{AuthUser, Credentials, TenantInfo};
use crate::auth::errors::AuthError;
use crate::auth::repository::AuthRepository;

pub struct SeaOrmAuthRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmAuthRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn to_user(u: models::user::Model) -> AuthUser {
    AuthUser { id: u.id, tenant_id: u.tenant_id, email: u.email, role: u.role }
}

fn to_tenant(t: models::tenant::Model) -> TenantInfo {
    TenantInfo { id: t.id, slug: t.slug, name: t.name }
}

fn conflict_or(e: ModelError) -> AuthError {
    if e.is_unique_violation() { AuthError::Conflict } else { e.into() }
}

#[async_trait::async_trait]
impl AuthRepository for SeaOrmAuthRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(models::user::find_by_email(&self.db, email).await?.map(to_user))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.map(to_user))
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantInfo>, AuthError> {
        let res = models::tenant::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.map(to_tenant))
    }

    async fn create_tenant_with_owner(
        &self,
        slug: &str,
        name: &str,
        email: &str,
        credentials: (String, String),
    ) -> Result<(TenantInfo, AuthUser), AuthError> {
        let txn = self.db.begin().await.map_err(|e| AuthError::Repository(e.to_string()))?;
        if models::tenant::find_by_slug(&txn, slug).await?.is_some()
            || models::user::find_by_email(&txn, email).await?.is_some()
        {
            return Err(AuthError::Conflict);
        }
        let tenant = models::tenant::create(&txn, slug, name).await.map_err(conflict_or)?;
        let user = models::user::create(&txn, Some(tenant.id), email, models::user::UserRole::Owner)
            .await
            .map_err(conflict_or)?;
        let (hash, algorithm) = credentials;
        models::user_credentials::upsert_password(&txn, user.id, hash, &algorithm).await?;
        txn.commit().await.map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok((to_tenant(tenant), to_user(user)))
    }

    async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError> {
        let res = models::user_credentials::find_by_user(&self.db, user_id).await?;
        Ok(res.map(|c| Credentials { user_id: c.user_id, password_hash: c.password_hash, password_algorithm: c.password_algorithm }))
    }

    async fn upsert_password(&self, user_id: Uuid, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError> {
        let c = models::user_credentials::upsert_password(&self.db, user_id, password_hash, &password_algorithm)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(Credentials { user_id: c.user_id, password_hash: c.password_hash, password_algorithm: c.password_algorithm })
    }

    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AuthError> {
        Ok(models::user::touch_last_login(&self.db, user_id).await?)
    }
}
