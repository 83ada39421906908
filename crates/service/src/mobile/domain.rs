use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use models::mobile_api_key::KeyStatus;
pub use models::mobile_device::DeviceStatus;
pub use models::provision_token::ProvisionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub name: String,
    pub status: DeviceStatus,
    pub active_event_id: Option<Uuid>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prefix: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    /// Human code, kept only until the admin acknowledges it or it is redeemed.
    pub plaintext: Option<String>,
    pub status: ProvisionStatus,
    pub expires_at: DateTime<Utc>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub used_by_device_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert for a freshly generated key. Carries the hash only.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub prefix: String,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProvisionToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prefix: String,
    pub token_hash: String,
    pub plaintext: String,
    pub expires_at: DateTime<Utc>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful redemption transaction.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub key: ApiKeyRecord,
    pub device: DeviceRecord,
    pub revoked_key_id: Option<Uuid>,
}

/// Returned once from key creation; `plaintext_key` is unrecoverable afterwards.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub key: ApiKeyRecord,
    pub plaintext_key: String,
    pub device: Option<DeviceRecord>,
}

/// Verified identity of a mobile caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileIdentity {
    pub tenant_id: Uuid,
    pub tenant_slug: String,
    pub api_key_id: Uuid,
    pub device_id: Uuid,
    pub active_event_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct IssuedProvisionToken {
    pub token: ProvisionRecord,
    /// Display form `XXXX-XXXX-XXXX`.
    pub code: String,
    pub qr_payload: String,
}

#[derive(Debug, Clone)]
pub struct RedeemedKey {
    pub tenant_id: Uuid,
    pub api_key_id: Uuid,
    pub device_id: Uuid,
    pub api_key: String,
}
