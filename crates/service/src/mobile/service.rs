use std::sync::Arc;

use chrono::{Duration, Utc};
use common::crypto::{ct_eq, random_human_code, random_token};
use tracing::{info, debug, warn, instrument};
use uuid::Uuid;

use super::domain::{
    ApiKeyRecord, CreatedApiKey, DeviceRecord, DeviceStatus, IssuedProvisionToken, MobileIdentity, NewApiKey, NewProvisionToken,
    ProvisionRecord, RedeemedKey,
};
use super::errors::MobileError;
use super::repository::MobileRepository;
use crate::token::{Purpose, TokenCodec};

/// Random bytes behind every API key; base64url makes it 43 characters.
pub const KEY_BYTES: usize = 32;
/// Leading key characters stored in clear for candidate lookup.
pub const KEY_PREFIX_LEN: usize = 8;
/// Anything shorter cannot be one of ours; rejected before hashing.
pub const MIN_KEY_LEN: usize = 40;
/// Symbols in a provision code, excluding display dashes.
pub const CODE_LEN: usize = 12;
pub const CODE_PREFIX_LEN: usize = 4;

#[derive(Clone, Debug)]
pub struct MobileConfig {
    pub provision_ttl_secs: u64,
    pub max_provision_ttl_secs: u64,
    /// Minimum gap between last-used/last-seen writes for one key.
    pub touch_interval_secs: i64,
    /// Upper bound on keys compared per authentication.
    pub candidate_limit: u64,
}

impl Default for MobileConfig {
    fn default() -> Self {
        Self { provision_ttl_secs: 15 * 60, max_provision_ttl_secs: configs::MAX_PROVISION_TTL_SECS, touch_interval_secs: 60, candidate_limit: 25 }
    }
}

impl From<&configs::AuthConfig> for MobileConfig {
    fn from(c: &configs::AuthConfig) -> Self {
        Self { provision_ttl_secs: c.provision_ttl_secs, ..Self::default() }
    }
}

/// `ABCDEFGHJKMN` -> `ABCD-EFGH-JKMN`.
fn display_code(raw: &str) -> String {
    raw.as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Accept what a human types: any case, dashes and spaces anywhere.
pub fn normalize_code(input: &str) -> Option<String> {
    let code: String = input.chars().filter(|c| !c.is_whitespace() && *c != '-').map(|c| c.to_ascii_uppercase()).collect();
    let valid = code.len() == CODE_LEN && code.bytes().all(|b| common::crypto::HUMAN_ALPHABET.contains(&b));
    valid.then_some(code)
}

fn validate_key_name(name: &str) -> Result<(), MobileError> {
    if name.trim().is_empty() || name.len() > 128 {
        return Err(MobileError::Validation("name must be 1-128 chars".into()));
    }
    Ok(())
}

/// Device registry business service independent of web framework
pub struct MobileService<R: MobileRepository + ?Sized> {
    repo: Arc<R>,
    codec: TokenCodec,
    cfg: MobileConfig,
}

impl<R: MobileRepository + ?Sized> MobileService<R> {
    pub fn new(repo: Arc<R>, codec: TokenCodec, cfg: MobileConfig) -> Self { Self { repo, codec, cfg } }

    fn new_key_material(&self, tenant_id: Uuid, name: &str) -> (String, NewApiKey) {
        let plaintext = random_token(KEY_BYTES);
        let row = NewApiKey {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            prefix: plaintext[..KEY_PREFIX_LEN].to_string(),
            key_hash: self.codec.keyed_hash(Purpose::MobileKey, &plaintext),
            created_at: Utc::now(),
        };
        (plaintext, row)
    }

    /// Issue a key, optionally with a device bound to it. The plaintext is
    /// only ever present in the return value.
    ///
    /// # Examples
    /// ```
    /// use service::mobile::{MobileService, repository::mock::MockMobileRepository, service::MobileConfig};
    /// use service::token::TokenCodec;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockMobileRepository::default());
    /// let tid = repo.add_tenant("acme");
    /// let svc = MobileService::new(repo, TokenCodec::from_secret([2u8; 32]).unwrap(), MobileConfig::default());
    /// let created = tokio_test::block_on(svc.create_api_key(tid, "Front desk", Some("Tablet 1"))).unwrap();
    /// assert_eq!(created.plaintext_key.len(), 43);
    /// let who = tokio_test::block_on(svc.authenticate(&created.plaintext_key)).unwrap();
    /// assert_eq!(who.tenant_slug, "acme");
    /// ```
    #[instrument(skip(self, name, device_name), fields(tenant_id = %tenant_id))]
    pub async fn create_api_key(&self, tenant_id: Uuid, name: &str, device_name: Option<&str>) -> Result<CreatedApiKey, MobileError> {
        validate_key_name(name)?;
        if let Some(d) = device_name {
            models::mobile_device::validate_name(d)?;
        }
        let (plaintext_key, row) = self.new_key_material(tenant_id, name);
        let (key, device) = self.repo.create_key(row, device_name.map(|d| d.trim().to_string())).await?;
        info!(api_key_id = %key.id, prefix = %key.prefix, device_id = ?device.as_ref().map(|d| d.id), "api_key_created");
        Ok(CreatedApiKey { key, plaintext_key, device })
    }

    /// Resolve a raw key from the request header. Every failure is the
    /// same [`MobileError::Unauthenticated`].
    #[instrument(skip_all)]
    pub async fn authenticate(&self, raw_key: &str) -> Result<MobileIdentity, MobileError> {
        let raw_key = raw_key.trim();
        if raw_key.len() < MIN_KEY_LEN || !raw_key.is_ascii() {
            return Err(MobileError::Unauthenticated);
        }
        let prefix = &raw_key[..KEY_PREFIX_LEN];
        let candidates = self.repo.find_active_keys_by_prefix(prefix, self.cfg.candidate_limit).await?;
        if candidates.is_empty() {
            debug!("no candidate for prefix");
            return Err(MobileError::Unauthenticated);
        }
        let hash = self.codec.keyed_hash(Purpose::MobileKey, raw_key);
        let key = candidates
            .into_iter()
            .find(|k| ct_eq(k.key_hash.as_bytes(), hash.as_bytes()))
            .ok_or(MobileError::Unauthenticated)?;

        // device status gates access independently of the key
        let device = self.repo.find_device_for_key(key.id).await?.ok_or(MobileError::Unauthenticated)?;
        if device.status != DeviceStatus::Active || device.tenant_id != key.tenant_id {
            return Err(MobileError::Unauthenticated);
        }
        let tenant_slug = self.repo.tenant_slug(key.tenant_id).await?.ok_or(MobileError::Unauthenticated)?;

        let now = Utc::now();
        let stale = key.last_used_at.map_or(true, |t| now - t >= Duration::seconds(self.cfg.touch_interval_secs));
        if stale {
            if let Err(e) = self.repo.touch(key.id, device.id, now).await {
                warn!(api_key_id = %key.id, error = %e, "touch_failed");
            }
        }

        Ok(MobileIdentity { tenant_id: key.tenant_id, tenant_slug, api_key_id: key.id, device_id: device.id, active_event_id: device.active_event_id })
    }

    /// Terminal. Also disables the bound device.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, api_key_id = %key_id))]
    pub async fn revoke_api_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<ApiKeyRecord, MobileError> {
        let key = self.repo.revoke_key(tenant_id, key_id, Utc::now()).await?.ok_or(MobileError::NotFound)?;
        info!("api_key_revoked");
        Ok(key)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, api_key_id = %key_id))]
    pub async fn delete_api_key(&self, tenant_id: Uuid, key_id: Uuid) -> Result<(), MobileError> {
        if !self.repo.delete_key(tenant_id, key_id).await? {
            return Err(MobileError::NotFound);
        }
        info!("api_key_deleted");
        Ok(())
    }

    pub async fn list_api_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyRecord>, MobileError> {
        self.repo.list_keys(tenant_id).await
    }

    pub async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<DeviceRecord>, MobileError> {
        self.repo.list_devices(tenant_id).await
    }

    pub async fn get_device(&self, tenant_id: Uuid, device_id: Uuid) -> Result<DeviceRecord, MobileError> {
        self.repo.get_device(tenant_id, device_id).await?.ok_or(MobileError::NotFound)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, device_id = %device_id))]
    pub async fn set_active_event(&self, tenant_id: Uuid, device_id: Uuid, event_id: Option<Uuid>) -> Result<DeviceRecord, MobileError> {
        self.repo.set_active_event(tenant_id, device_id, event_id).await?.ok_or(MobileError::NotFound)
    }

    /// Mint a single-use provision code. `device_id` pre-binds it to an
    /// existing device of the same tenant (re-provisioning).
    #[instrument(skip(self, device_name), fields(tenant_id = %tenant_id))]
    pub async fn issue_provision_token(
        &self,
        tenant_id: Uuid,
        device_id: Option<Uuid>,
        device_name: Option<String>,
        ttl_secs: Option<u64>,
    ) -> Result<IssuedProvisionToken, MobileError> {
        let ttl = ttl_secs.unwrap_or(self.cfg.provision_ttl_secs);
        if ttl == 0 || ttl > self.cfg.max_provision_ttl_secs {
            return Err(MobileError::Validation(format!("ttl must be within 1..={} seconds", self.cfg.max_provision_ttl_secs)));
        }
        if let Some(name) = &device_name {
            models::mobile_device::validate_name(name)?;
        }
        if let Some(id) = device_id {
            self.repo.get_device(tenant_id, id).await?.ok_or(MobileError::NotFound)?;
        }
        let slug = self.repo.tenant_slug(tenant_id).await?.ok_or(MobileError::NotFound)?;

        let raw = random_human_code(CODE_LEN);
        let code = display_code(&raw);
        let now = Utc::now();
        let token = self
            .repo
            .insert_provision_token(NewProvisionToken {
                id: Uuid::new_v4(),
                tenant_id,
                prefix: raw[..CODE_PREFIX_LEN].to_string(),
                token_hash: self.codec.keyed_hash(Purpose::Provision, &raw),
                plaintext: code.clone(),
                expires_at: now + Duration::seconds(ttl as i64),
                device_id,
                device_name: device_name.map(|n| n.trim().to_string()),
                created_at: now,
            })
            .await?;
        let qr_payload = serde_json::json!({ "tenant": slug, "code": code }).to_string();
        info!(provision_token_id = %token.id, expires_at = %token.expires_at, "provision_token_issued");
        Ok(IssuedProvisionToken { token, code, qr_payload })
    }

    pub async fn list_provision_tokens(&self, tenant_id: Uuid) -> Result<Vec<ProvisionRecord>, MobileError> {
        self.repo.list_provision_tokens(tenant_id).await
    }

    /// Drop the retained plaintext once the admin has shown or sent it.
    pub async fn acknowledge_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<ProvisionRecord, MobileError> {
        self.repo.acknowledge_provision_token(tenant_id, id).await?.ok_or(MobileError::NotFound)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, provision_token_id = %id))]
    pub async fn revoke_provision_token(&self, tenant_id: Uuid, id: Uuid) -> Result<ProvisionRecord, MobileError> {
        let t = self.repo.revoke_provision_token(tenant_id, id).await?.ok_or(MobileError::NotFound)?;
        info!("provision_token_revoked");
        Ok(t)
    }

    /// Exchange `(tenant slug, code)` for a brand-new API key. Unknown
    /// tenant, unknown code, expired, revoked and already used all end in
    /// the same [`MobileError::InvalidCode`].
    #[instrument(skip(self, code), fields(tenant_slug = %tenant_slug))]
    pub async fn redeem_provision_token(&self, tenant_slug: &str, code: &str) -> Result<RedeemedKey, MobileError> {
        let code = normalize_code(code).ok_or(MobileError::InvalidCode)?;
        let tenant_id = self.repo.tenant_id_by_slug(tenant_slug.trim()).await?.ok_or(MobileError::InvalidCode)?;
        let (api_key, row) = self.new_key_material(tenant_id, "Provisioned device");
        let token_hash = self.codec.keyed_hash(Purpose::Provision, &code);
        let redemption = self
            .repo
            .redeem_provision_token(tenant_id, &token_hash, Utc::now(), row)
            .await?
            .ok_or(MobileError::InvalidCode)?;
        info!(
            tenant_id = %tenant_id,
            api_key_id = %redemption.key.id,
            device_id = %redemption.device.id,
            revoked_key_id = ?redemption.revoked_key_id,
            "provision_token_redeemed"
        );
        Ok(RedeemedKey { tenant_id, api_key_id: redemption.key.id, device_id: redemption.device.id, api_key })
    }

    /// Housekeeping only; expired rows are already rejected at lookup.
    #[instrument(skip(self))]
    pub async fn purge_expired_provision_tokens(&self) -> Result<u64, MobileError> {
        let n = self.repo.purge_expired_provision_tokens(Utc::now()).await?;
        if n > 0 {
            info!(purged = n, "expired_provision_tokens_purged");
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobile::domain::{KeyStatus, ProvisionStatus};
    use crate::mobile::repository::mock::MockMobileRepository;

    fn setup() -> (Arc<MobileService<MockMobileRepository>>, Arc<MockMobileRepository>, Uuid) {
        let repo = Arc::new(MockMobileRepository::default());
        let tid = repo.add_tenant("acme");
        let codec = TokenCodec::from_secret("mobile-registry-secret-0123456789").unwrap();
        (Arc::new(MobileService::new(repo.clone(), codec, MobileConfig::default())), repo, tid)
    }

    #[test]
    fn codes_normalize() {
        assert_eq!(normalize_code("abcd-efgh-jkmn").as_deref(), Some("ABCDEFGHJKMN"));
        assert_eq!(normalize_code(" ABCD EFGH JKMN ").as_deref(), Some("ABCDEFGHJKMN"));
        assert!(normalize_code("ABCD-EFGH").is_none());
        // 0, O, 1, I are not in the alphabet
        assert!(normalize_code("ABCD-EFGH-JK0O").is_none());
        assert_eq!(display_code("ABCDEFGHJKMN"), "ABCD-EFGH-JKMN");
    }

    #[tokio::test]
    async fn key_without_device_or_with_short_input_is_rejected() {
        let (svc, _, tid) = setup();
        let created = svc.create_api_key(tid, "Loose key", None).await.unwrap();
        assert!(created.key.key_hash.len() == 64 && !created.key.key_hash.contains(&created.plaintext_key));
        assert!(matches!(svc.authenticate(&created.plaintext_key).await, Err(MobileError::Unauthenticated)));
        assert!(matches!(svc.authenticate("short").await, Err(MobileError::Unauthenticated)));
        let mut wrong = created.plaintext_key.clone();
        wrong.replace_range(20..21, if &wrong[20..21] == "A" { "B" } else { "A" });
        assert!(matches!(svc.authenticate(&wrong).await, Err(MobileError::Unauthenticated)));
    }

    #[tokio::test]
    async fn authenticate_touches_and_checks_device() {
        let (svc, repo, tid) = setup();
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        let device = created.device.clone().unwrap();
        let who = svc.authenticate(&created.plaintext_key).await.unwrap();
        assert_eq!(who, MobileIdentity { tenant_id: tid, tenant_slug: "acme".into(), api_key_id: created.key.id, device_id: device.id, active_event_id: None });
        assert!(repo.key(created.key.id).unwrap().last_used_at.is_some());

        repo.set_device_status(device.id, DeviceStatus::Disabled);
        assert!(matches!(svc.authenticate(&created.plaintext_key).await, Err(MobileError::Unauthenticated)));
    }

    #[tokio::test]
    async fn last_used_writes_are_throttled() {
        let (svc, repo, tid) = setup();
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        svc.authenticate(&created.plaintext_key).await.unwrap();
        svc.authenticate(&created.plaintext_key).await.unwrap();
        svc.authenticate(&created.plaintext_key).await.unwrap();
        assert_eq!(repo.touch_count(created.key.id), 1);

        let eager = MobileService::new(
            repo.clone(),
            TokenCodec::from_secret("mobile-registry-secret-0123456789").unwrap(),
            MobileConfig { touch_interval_secs: 0, ..MobileConfig::default() },
        );
        eager.authenticate(&created.plaintext_key).await.unwrap();
        assert_eq!(repo.touch_count(created.key.id), 2);
    }

    #[tokio::test]
    async fn candidate_lookup_is_capped() {
        let (svc, repo, tid) = setup();
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        // newer keys sharing the prefix crowd the real one out of the window
        for i in 0..MobileConfig::default().candidate_limit {
            let decoy = NewApiKey {
                id: Uuid::new_v4(),
                tenant_id: tid,
                name: format!("decoy {i}"),
                prefix: created.key.prefix.clone(),
                key_hash: format!("{i:064x}"),
                created_at: Utc::now() + Duration::seconds(i as i64 + 1),
            };
            repo.create_key(decoy, None).await.unwrap();
        }
        assert!(matches!(svc.authenticate(&created.plaintext_key).await, Err(MobileError::Unauthenticated)));

        let wider = MobileService::new(
            repo.clone(),
            TokenCodec::from_secret("mobile-registry-secret-0123456789").unwrap(),
            MobileConfig { candidate_limit: 26, ..MobileConfig::default() },
        );
        assert_eq!(wider.authenticate(&created.plaintext_key).await.unwrap().api_key_id, created.key.id);
    }

    #[tokio::test]
    async fn revoke_is_terminal_and_tenant_scoped() {
        let (svc, repo, tid) = setup();
        let other = repo.add_tenant("globex");
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();

        assert!(matches!(svc.revoke_api_key(other, created.key.id).await, Err(MobileError::NotFound)));
        assert!(matches!(svc.revoke_api_key(tid, Uuid::new_v4()).await, Err(MobileError::NotFound)));

        let revoked = svc.revoke_api_key(tid, created.key.id).await.unwrap();
        assert_eq!(revoked.status, KeyStatus::Revoked);
        let device = svc.get_device(tid, created.device.unwrap().id).await.unwrap();
        assert_eq!(device.status, DeviceStatus::Disabled);
        assert!(matches!(svc.authenticate(&created.plaintext_key).await, Err(MobileError::Unauthenticated)));
        // idempotent, keeps the original timestamp
        let again = svc.revoke_api_key(tid, created.key.id).await.unwrap();
        assert_eq!(again.revoked_at, revoked.revoked_at);
    }

    #[tokio::test]
    async fn delete_unbinds_device() {
        let (svc, _, tid) = setup();
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        svc.delete_api_key(tid, created.key.id).await.unwrap();
        let device = svc.get_device(tid, created.device.unwrap().id).await.unwrap();
        assert_eq!((device.status, device.api_key_id), (DeviceStatus::Disabled, None));
        assert!(svc.list_api_keys(tid).await.unwrap().is_empty());
        assert!(matches!(svc.delete_api_key(tid, created.key.id).await, Err(MobileError::NotFound)));
    }

    #[tokio::test]
    async fn provision_round_trip_is_single_use() {
        let (svc, _, tid) = setup();
        let issued = svc.issue_provision_token(tid, None, Some("Booth 3".into()), None).await.unwrap();
        assert_eq!(issued.code.len(), 14);
        let qr: serde_json::Value = serde_json::from_str(&issued.qr_payload).unwrap();
        assert_eq!(qr["tenant"], "acme");
        assert_eq!(qr["code"], issued.code.as_str());

        let redeemed = svc.redeem_provision_token("acme", &issued.code.to_lowercase()).await.unwrap();
        assert!(redeemed.api_key.len() >= 43);
        let who = svc.authenticate(&redeemed.api_key).await.unwrap();
        assert_eq!(who.device_id, redeemed.device_id);
        let device = svc.get_device(tid, redeemed.device_id).await.unwrap();
        assert_eq!(device.name, "Booth 3");

        let tokens = svc.list_provision_tokens(tid).await.unwrap();
        assert_eq!(tokens[0].status, ProvisionStatus::Used);
        assert_eq!(tokens[0].plaintext, None);
        assert_eq!(tokens[0].used_by_device_id, Some(redeemed.device_id));

        assert!(matches!(svc.redeem_provision_token("acme", &issued.code).await, Err(MobileError::InvalidCode)));
    }

    #[tokio::test]
    async fn redeem_failures_are_indistinguishable() {
        let (svc, repo, tid) = setup();
        repo.add_tenant("globex");
        let issued = svc.issue_provision_token(tid, None, None, None).await.unwrap();
        let wrong_tenant = svc.redeem_provision_token("globex", &issued.code).await.unwrap_err();
        let no_tenant = svc.redeem_provision_token("nope", &issued.code).await.unwrap_err();
        let garbage = svc.redeem_provision_token("acme", "not a code").await.unwrap_err();

        let revoked = svc.issue_provision_token(tid, None, None, None).await.unwrap();
        svc.revoke_provision_token(tid, revoked.token.id).await.unwrap();
        let after_revoke = svc.redeem_provision_token("acme", &revoked.code).await.unwrap_err();

        let expired = svc.issue_provision_token(tid, None, None, Some(60)).await.unwrap();
        repo.set_token_expiry(expired.token.id, Utc::now() - Duration::seconds(1));
        let after_expiry = svc.redeem_provision_token("acme", &expired.code).await.unwrap_err();

        let used = svc.issue_provision_token(tid, None, None, None).await.unwrap();
        svc.redeem_provision_token("acme", &used.code).await.unwrap();
        let after_use = svc.redeem_provision_token("acme", &used.code).await.unwrap_err();

        for e in [wrong_tenant, no_tenant, garbage, after_revoke, after_expiry, after_use] {
            assert!(matches!(e, MobileError::InvalidCode));
        }
    }

    #[tokio::test]
    async fn reprovisioning_rotates_the_device_key() {
        let (svc, repo, tid) = setup();
        let first = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        let device_id = first.device.as_ref().unwrap().id;

        let issued = svc.issue_provision_token(tid, Some(device_id), None, None).await.unwrap();
        let redeemed = svc.redeem_provision_token("acme", &issued.code).await.unwrap();
        assert_eq!(redeemed.device_id, device_id);

        assert_eq!(repo.key(first.key.id).unwrap().status, KeyStatus::Revoked);
        assert!(svc.authenticate(&first.plaintext_key).await.is_err());
        assert!(svc.authenticate(&redeemed.api_key).await.is_ok());

        let active: Vec<_> = svc
            .list_api_keys(tid)
            .await
            .unwrap()
            .into_iter()
            .filter(|k| k.status == KeyStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(svc.get_device(tid, device_id).await.unwrap().api_key_id, Some(active[0].id));
    }

    #[tokio::test]
    async fn concurrent_redeem_has_one_winner() {
        let (svc, _, tid) = setup();
        let issued = svc.issue_provision_token(tid, None, None, None).await.unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                let code = issued.code.clone();
                tokio::spawn(async move { svc.redeem_provision_token("acme", &code).await })
            })
            .collect();
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, MobileError::InvalidCode)),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn provision_admin_operations() {
        let (svc, repo, tid) = setup();
        let other = repo.add_tenant("globex");
        assert!(matches!(svc.issue_provision_token(tid, Some(Uuid::new_v4()), None, None).await, Err(MobileError::NotFound)));
        assert!(matches!(svc.issue_provision_token(tid, None, None, Some(0)).await, Err(MobileError::Validation(_))));
        assert!(matches!(svc.issue_provision_token(tid, None, None, Some(2 * 86_400)).await, Err(MobileError::Validation(_))));

        let issued = svc.issue_provision_token(tid, None, None, Some(60)).await.unwrap();
        assert!(matches!(svc.acknowledge_provision_token(other, issued.token.id).await, Err(MobileError::NotFound)));
        let acked = svc.acknowledge_provision_token(tid, issued.token.id).await.unwrap();
        assert!(acked.plaintext.is_none());
        assert_eq!(acked.status, ProvisionStatus::Active);
        // acknowledging only hides the code; it still redeems
        assert!(svc.redeem_provision_token("acme", &issued.code).await.is_ok());
        assert_eq!(svc.purge_expired_provision_tokens().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn active_event_is_tenant_scoped() {
        let (svc, repo, tid) = setup();
        let other = repo.add_tenant("globex");
        let created = svc.create_api_key(tid, "Gate", Some("Gate tablet")).await.unwrap();
        let device_id = created.device.unwrap().id;
        let event = Uuid::new_v4();
        assert!(matches!(svc.set_active_event(other, device_id, Some(event)).await, Err(MobileError::NotFound)));
        let d = svc.set_active_event(tid, device_id, Some(event)).await.unwrap();
        assert_eq!(d.active_event_id, Some(event));
        assert_eq!(svc.authenticate(&created.plaintext_key).await.unwrap().active_event_id, Some(event));
        assert!(svc.list_devices(other).await.unwrap().is_empty());
    }
}
