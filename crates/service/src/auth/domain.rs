use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use models::user::UserRole;

/// Tenant signup input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
}

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Domain user (business view)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// Domain credentials (hashed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: Uuid,
    pub password_hash: String,
    pub password_algorithm: String,
}

/// Successful login: the signed cookie value plus who it belongs to.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub tenant: TenantInfo,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Fully resolved identity behind a session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub tenant: TenantInfo,
}
