use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{ApiKeyRecord, DeviceRecord, NewApiKey, NewProvisionToken, ProvisionRecord, Redemption};
use super::errors::MobileError;

/// Persistence for keys, devices and provision tokens.
///
/// Every method taking a `tenant_id` filters on `(id, tenant_id)` together;
/// a row owned by another tenant is indistinguishable from a missing one.
#[async_trait]
pub trait MobileRepository: Send + Sync {
    async fn tenant_slug(&self, tenant_id: Uuid) -> Result<Option<String>, MobileError>;
    async fn tenant_id_by_slug(&self, slug: &str) -> Result<Option<Uuid>, MobileError>;

    /// Insert the key and, when `device_name` is given, its bound device in
    /// one unit.
    async fn create_key(&self, key: NewApiKey, device_name: Option<String>) -> Result<(ApiKeyRecord, Option<DeviceRecord>), MobileError>;
    /// ACTIVE keys sharing `prefix`, newest first, at most `limit` of them.
    async fn find_active_keys_by_prefix(&self, prefix: &str, limit: u64) -> Result<Vec<ApiKeyRecord>, MobileError>;
    async fn find_device_for_key(&self, key_id: Uuid) -> Result<Option<DeviceRecord>, MobileError>;
    async fn touch(&self, key_id: Uuid, device_id: Uuid, now: DateTime<Utc>) -> Result<(), MobileError>;
    async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyRecord>, MobileError>;
    /// REVOKED + disable the bound device. Already revoked keys are returned as-is.
    async fn revoke_key(&self, tenant_id: Uuid, key_id: Uuid, now: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, MobileError>;
    /// Unbind + disable the device, then drop the key row.
    async fn delete_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<bool, MobileError>;

    async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<DeviceRecord>, MobileError>;
    async fn get_device(&self, tenant_id: Uuid, device_id: Uuid) -> Result<Option<DeviceRecord>, MobileError>;
    async fn set_active_event(&self, tenant_id: Uuid, device_id: Uuid, event_id: Option<Uuid>) -> Result<Option<DeviceRecord>, MobileError>;

    async fn insert_provision_token(&self, token: NewProvisionToken) -> Result<ProvisionRecord, MobileError>;
    async fn list_provision_tokens(&self, tenant_id: Uuid) -> Result<Vec<ProvisionRecord>, MobileError>;
    /// Forget the retained plaintext.
    async fn acknowledge_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError>;
    async fn revoke_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError>;

    /// All-or-nothing: mark the token USED, create `new_key`, rebind the
    /// target device to it, then revoke the device's previous key.
    /// `None` when no ACTIVE unexpired token matches.
    async fn redeem_provision_token(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
        new_key: NewApiKey,
    ) -> Result<Option<Redemption>, MobileError>;

    async fn purge_expired_provision_tokens(&self, now: DateTime<Utc>) -> Result<u64, MobileError>;
}

/// Simple in-memory mock repository for tests and doc examples.
///
/// One mutex guards all tables, so each call is atomic the way a database
/// transaction would be.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::mobile::domain::{DeviceStatus, KeyStatus, ProvisionStatus};

    #[derive(Default)]
    struct State {
        tenants: HashMap<Uuid, String>,
        keys: HashMap<Uuid, ApiKeyRecord>,
        devices: HashMap<Uuid, DeviceRecord>,
        tokens: HashMap<Uuid, ProvisionRecord>,
        touches: HashMap<Uuid, u32>,
    }

    #[derive(Default)]
    pub struct MockMobileRepository {
        state: Mutex<State>,
    }

    fn new_device(tenant_id: Uuid, key_id: Uuid, name: String, now: DateTime<Utc>) -> DeviceRecord {
        DeviceRecord {
            id: Uuid::new_v4(),
            tenant_id,
            api_key_id: Some(key_id),
            name,
            status: DeviceStatus::Active,
            active_event_id: None,
            last_seen_at: None,
            created_at: now,
        }
    }

    fn key_record(k: NewApiKey) -> ApiKeyRecord {
        ApiKeyRecord {
            id: k.id,
            tenant_id: k.tenant_id,
            name: k.name,
            prefix: k.prefix,
            key_hash: k.key_hash,
            status: KeyStatus::Active,
            created_at: k.created_at,
            revoked_at: None,
            last_used_at: None,
        }
    }

    impl MockMobileRepository {
        /// Register a tenant the way signup would have.
        pub fn add_tenant(&self, slug: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.state.lock().unwrap().tenants.insert(id, slug.to_string());
            id
        }

        /// Mirror a tenant created elsewhere (e.g. by the auth store).
        pub fn insert_tenant(&self, id: Uuid, slug: &str) {
            self.state.lock().unwrap().tenants.insert(id, slug.to_string());
        }

        pub fn key(&self, id: Uuid) -> Option<ApiKeyRecord> {
            self.state.lock().unwrap().keys.get(&id).cloned()
        }

        /// Number of last-used writes recorded for a key.
        pub fn touch_count(&self, key_id: Uuid) -> u32 {
            self.state.lock().unwrap().touches.get(&key_id).copied().unwrap_or(0)
        }

        /// Test hook: move a provision token's expiry.
        pub fn set_token_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) {
            if let Some(t) = self.state.lock().unwrap().tokens.get_mut(&id) {
                t.expires_at = expires_at;
            }
        }

        /// Test hook: push a device into a given status.
        pub fn set_device_status(&self, id: Uuid, status: DeviceStatus) {
            if let Some(d) = self.state.lock().unwrap().devices.get_mut(&id) {
                d.status = status;
            }
        }
    }

    #[async_trait]
    impl MobileRepository for MockMobileRepository {
        async fn tenant_slug(&self, tenant_id: Uuid) -> Result<Option<String>, MobileError> {
            Ok(self.state.lock().unwrap().tenants.get(&tenant_id).cloned())
        }

        async fn tenant_id_by_slug(&self, slug: &str) -> Result<Option<Uuid>, MobileError> {
            Ok(self.state.lock().unwrap().tenants.iter().find(|(_, s)| s.as_str() == slug).map(|(id, _)| *id))
        }

        async fn create_key(&self, key: NewApiKey, device_name: Option<String>) -> Result<(ApiKeyRecord, Option<DeviceRecord>), MobileError> {
            let mut st = self.state.lock().unwrap();
            let now = key.created_at;
            let rec = key_record(key);
            let device = device_name.map(|name| new_device(rec.tenant_id, rec.id, name, now));
            st.keys.insert(rec.id, rec.clone());
            if let Some(d) = &device {
                st.devices.insert(d.id, d.clone());
            }
            Ok((rec, device))
        }

        async fn find_active_keys_by_prefix(&self, prefix: &str, limit: u64) -> Result<Vec<ApiKeyRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            let mut out: Vec<_> = st.keys.values().filter(|k| k.prefix == prefix && k.status == KeyStatus::Active).cloned().collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            out.truncate(limit as usize);
            Ok(out)
        }

        async fn find_device_for_key(&self, key_id: Uuid) -> Result<Option<DeviceRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            Ok(st.devices.values().find(|d| d.api_key_id == Some(key_id)).cloned())
        }

        async fn touch(&self, key_id: Uuid, device_id: Uuid, now: DateTime<Utc>) -> Result<(), MobileError> {
            let mut st = self.state.lock().unwrap();
            *st.touches.entry(key_id).or_default() += 1;
            if let Some(k) = st.keys.get_mut(&key_id) {
                k.last_used_at = Some(now);
            }
            if let Some(d) = st.devices.get_mut(&device_id) {
                d.last_seen_at = Some(now);
            }
            Ok(())
        }

        async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            let mut out: Vec<_> = st.keys.values().filter(|k| k.tenant_id == tenant_id).cloned().collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(out)
        }

        async fn revoke_key(&self, tenant_id: Uuid, key_id: Uuid, now: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, MobileError> {
            let mut st = self.state.lock().unwrap();
            let Some(k) = st.keys.get_mut(&key_id).filter(|k| k.tenant_id == tenant_id) else { return Ok(None) };
            if k.status == KeyStatus::Active {
                k.status = KeyStatus::Revoked;
                k.revoked_at = Some(now);
            }
            let rec = k.clone();
            for d in st.devices.values_mut().filter(|d| d.api_key_id == Some(key_id)) {
                d.status = DeviceStatus::Disabled;
            }
            Ok(Some(rec))
        }

        async fn delete_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<bool, MobileError> {
            let mut st = self.state.lock().unwrap();
            if !st.keys.get(&key_id).is_some_and(|k| k.tenant_id == tenant_id) {
                return Ok(false);
            }
            for d in st.devices.values_mut().filter(|d| d.api_key_id == Some(key_id)) {
                d.status = DeviceStatus::Disabled;
                d.api_key_id = None;
            }
            st.keys.remove(&key_id);
            Ok(true)
        }

        async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<DeviceRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            let mut out: Vec<_> = st.devices.values().filter(|d| d.tenant_id == tenant_id).cloned().collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(out)
        }

        async fn get_device(&self, tenant_id: Uuid, device_id: Uuid) -> Result<Option<DeviceRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            Ok(st.devices.get(&device_id).filter(|d| d.tenant_id == tenant_id).cloned())
        }

        async fn set_active_event(&self, tenant_id: Uuid, device_id: Uuid, event_id: Option<Uuid>) -> Result<Option<DeviceRecord>, MobileError> {
            let mut st = self.state.lock().unwrap();
            let Some(d) = st.devices.get_mut(&device_id).filter(|d| d.tenant_id == tenant_id) else { return Ok(None) };
            d.active_event_id = event_id;
            Ok(Some(d.clone()))
        }

        async fn insert_provision_token(&self, t: NewProvisionToken) -> Result<ProvisionRecord, MobileError> {
            let rec = ProvisionRecord {
                id: t.id,
                tenant_id: t.tenant_id,
                prefix: t.prefix,
                token_hash: t.token_hash,
                plaintext: Some(t.plaintext),
                status: ProvisionStatus::Active,
                expires_at: t.expires_at,
                device_id: t.device_id,
                device_name: t.device_name,
                used_by_device_id: None,
                used_at: None,
                created_at: t.created_at,
            };
            self.state.lock().unwrap().tokens.insert(rec.id, rec.clone());
            Ok(rec)
        }

        async fn list_provision_tokens(&self, tenant_id: Uuid) -> Result<Vec<ProvisionRecord>, MobileError> {
            let st = self.state.lock().unwrap();
            let mut out: Vec<_> = st.tokens.values().filter(|t| t.tenant_id == tenant_id).cloned().collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(out)
        }

        async fn acknowledge_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError> {
            let mut st = self.state.lock().unwrap();
            let Some(t) = st.tokens.get_mut(&id).filter(|t| t.tenant_id == tenant_id) else { return Ok(None) };
            t.plaintext = None;
            Ok(Some(t.clone()))
        }

        async fn revoke_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ProvisionRecord>, MobileError> {
            let mut st = self.state.lock().unwrap();
            let Some(t) = st.tokens.get_mut(&id).filter(|t| t.tenant_id == tenant_id) else { return Ok(None) };
            if t.status == ProvisionStatus::Active {
                t.status = ProvisionStatus::Revoked;
            }
            t.plaintext = None;
            Ok(Some(t.clone()))
        }

        async fn redeem_provision_token(
            &self,
            tenant_id: Uuid,
            token_hash: &str,
            now: DateTime<Utc>,
            new_key: NewApiKey,
        ) -> Result<Option<Redemption>, MobileError> {
            let mut st = self.state.lock().unwrap();
            let Some(token) = st
                .tokens
                .values()
                .find(|t| t.tenant_id == tenant_id && t.token_hash == token_hash)
                .filter(|t| t.status == ProvisionStatus::Active && t.expires_at > now)
                .cloned()
            else {
                return Ok(None);
            };

            let prebound = token.device_id.and_then(|id| st.devices.get(&id).filter(|d| d.tenant_id == tenant_id).cloned());
            if token.device_id.is_some() && prebound.is_none() {
                return Ok(None);
            }

            let key = key_record(new_key);
            st.keys.insert(key.id, key.clone());

            let (device, old_key) = match prebound {
                Some(mut d) => {
                    let old = d.api_key_id;
                    d.api_key_id = Some(key.id);
                    d.status = DeviceStatus::Active;
                    (d, old)
                }
                None => {
                    let name = token.device_name.clone().unwrap_or_else(|| "Device".to_string());
                    (new_device(tenant_id, key.id, name, now), None)
                }
            };
            st.devices.insert(device.id, device.clone());

            let mut revoked_key_id = None;
            if let Some(old_id) = old_key {
                if let Some(old) = st.keys.get_mut(&old_id) {
                    if old.status == KeyStatus::Active {
                        old.status = KeyStatus::Revoked;
                        old.revoked_at = Some(now);
                    }
                    revoked_key_id = Some(old_id);
                }
            }

            if let Some(t) = st.tokens.get_mut(&token.id) {
                t.status = ProvisionStatus::Used;
                t.plaintext = None;
                t.used_by_device_id = Some(device.id);
                t.used_at = Some(now);
            }
            Ok(Some(Redemption { key, device, revoked_key_id }))
        }

        async fn purge_expired_provision_tokens(&self, now: DateTime<Utc>) -> Result<u64, MobileError> {
            let mut st = self.state.lock().unwrap();
            let before = st.tokens.len();
            st.tokens.retain(|_, t| t.expires_at > now);
            Ok((before - st.tokens.len()) as u64)
        }
    }
}
