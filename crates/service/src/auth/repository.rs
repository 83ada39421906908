use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{AuthUser, Credentials, TenantInfo, UserRole};
use super::errors::AuthError;

/// Repository abstraction for auth-related persistence.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// `email` is already normalised (trimmed, lowercase).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError>;
    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantInfo>, AuthError>;

    /// Create tenant, owner user and credentials as one unit. Duplicate slug
    /// or email is [`AuthError::Conflict`].
    async fn create_tenant_with_owner(
        &self,
        slug: &str,
        name: &str,
        email: &str,
        credentials: (String, String),
    ) -> Result<(TenantInfo, AuthUser), AuthError>;

    async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError>;
    async fn upsert_password(&self, user_id: Uuid, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError>;
    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AuthError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    #[derive(Default)]
    pub struct MockAuthRepository {
        tenants: Mutex<HashMap<Uuid, TenantInfo>>,
        users: Mutex<HashMap<String, AuthUser>>, // key: email
        creds: Mutex<HashMap<Uuid, Credentials>>, // key: user_id
        last_login: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    }

    impl MockAuthRepository {
        pub fn last_login(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
            self.last_login.lock().unwrap().get(&user_id).copied()
        }
    }

    #[async_trait]
    impl AuthRepository for MockAuthRepository {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
            Ok(self.users.lock().unwrap().get(email).cloned())
        }

        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
            Ok(self.users.lock().unwrap().values().find(|u| u.id == id).cloned())
        }

        async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantInfo>, AuthError> {
            Ok(self.tenants.lock().unwrap().get(&id).cloned())
        }

        async fn create_tenant_with_owner(
            &self,
            slug: &str,
            name: &str,
            email: &str,
            credentials: (String, String),
        ) -> Result<(TenantInfo, AuthUser), AuthError> {
            let mut tenants = self.tenants.lock().unwrap();
            let mut users = self.users.lock().unwrap();
            if users.contains_key(email) || tenants.values().any(|t| t.slug == slug) {
                return Err(AuthError::Conflict);
            }
            let tenant = TenantInfo { id: Uuid::new_v4(), slug: slug.to_string(), name: name.to_string() };
            let user = AuthUser { id: Uuid::new_v4(), tenant_id: Some(tenant.id), email: email.to_string(), role: UserRole::Owner };
            tenants.insert(tenant.id, tenant.clone());
            users.insert(email.to_string(), user.clone());
            let (password_hash, password_algorithm) = credentials;
            self.creds.lock().unwrap().insert(user.id, Credentials { user_id: user.id, password_hash, password_algorithm });
            Ok((tenant, user))
        }

        async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError> {
            let creds = self.creds.lock().unwrap();
            Ok(creds.get(&user_id).cloned())
        }

        async fn upsert_password(&self, user_id: Uuid, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError> {
            let mut creds = self.creds.lock().unwrap();
            let c = Credentials { user_id, password_hash, password_algorithm };
            creds.insert(user_id, c.clone());
            Ok(c)
        }

        async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AuthError> {
            self.last_login.lock().unwrap().insert(user_id, Utc::now());
            Ok(())
        }
    }
}
