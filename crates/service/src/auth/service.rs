use std::sync::Arc;

use argon2::{Argon2, password_hash::{PasswordHasher, PasswordVerifier, SaltString}, PasswordHash};
use chrono::{TimeZone, Utc};
use common::crypto::ct_eq;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use tracing::{info, debug, warn, instrument};

use super::domain::{RegisterInput, LoginInput, AuthSession, CurrentUser};
use super::errors::AuthError;
use super::notifier::{LogNotifier, Notifier};
use super::repository::AuthRepository;
use crate::token::{Purpose, ResetClaims, SessionClaims, TokenCodec};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Verified against when the email is unknown, so both failure paths pay
/// for one argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default().hash_password(b"not-a-real-password", &salt).ok().map(|h| h.to_string())
});

/// Auth service configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub session_ttl_secs: u64,
    pub password_reset_ttl_secs: u64,
    pub password_algorithm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { session_ttl_secs: 12 * 60 * 60, password_reset_ttl_secs: 60 * 60, password_algorithm: "argon2id".into() }
    }
}

impl From<&configs::AuthConfig> for AuthConfig {
    fn from(c: &configs::AuthConfig) -> Self {
        Self { session_ttl_secs: c.session_ttl_secs, password_reset_ttl_secs: c.password_reset_ttl_secs, ..Self::default() }
    }
}

/// Auth business service independent of web framework
pub struct AuthService<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    codec: TokenCodec,
    notifier: Arc<dyn Notifier>,
    cfg: AuthConfig,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::HashError(e.to_string()))?
        .to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

fn check_password_policy(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!("password too short (>={MIN_PASSWORD_LEN})")));
    }
    Ok(())
}

impl<R: AuthRepository + ?Sized> AuthService<R> {
    pub fn new(repo: Arc<R>, codec: TokenCodec, cfg: AuthConfig) -> Self {
        Self { repo, codec, notifier: Arc::new(LogNotifier), cfg }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn codec(&self) -> &TokenCodec { &self.codec }

    pub fn session_ttl_secs(&self) -> u64 { self.cfg.session_ttl_secs }

    /// Sign up a new tenant together with its OWNER user.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::RegisterInput;
    /// use service::token::TokenCodec;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo, TokenCodec::from_secret([1u8; 32]).unwrap(), AuthConfig::default());
    /// let input = RegisterInput { tenant_name: "Acme".into(), tenant_slug: "acme".into(), email: "Owner@Acme.test".into(), password: "Secret123!".into() };
    /// let created = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(created.user.email, "owner@acme.test");
    /// assert_eq!(created.user.tenant_id, Some(created.tenant.id));
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email, tenant_slug = %input.tenant_slug))]
    pub async fn register(&self, input: RegisterInput) -> Result<CurrentUser, AuthError> {
        check_password_policy(&input.password)?;
        models::tenant::validate_slug(&input.tenant_slug)?;
        models::tenant::validate_name(&input.tenant_name)?;
        models::user::validate_email(&input.email)?;
        let email = models::user::normalize_email(&input.email);

        if let Some(existing) = self.repo.find_user_by_email(&email).await? {
            debug!("user exists: {}", existing.email);
            return Err(AuthError::Conflict);
        }

        let hash = hash_password(&input.password)?;
        let (tenant, user) = self
            .repo
            .create_tenant_with_owner(&input.tenant_slug, input.tenant_name.trim(), &email, (hash, self.cfg.password_algorithm.clone()))
            .await?;
        info!(user_id = %user.id, tenant_id = %tenant.id, email = %user.email, "tenant_registered");
        Ok(CurrentUser { user, tenant })
    }

    /// Check credentials and mint a session token.
    ///
    /// Unknown email and wrong password are the same [`AuthError::Unauthorized`].
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::{RegisterInput, LoginInput};
    /// use service::token::TokenCodec;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo, TokenCodec::from_secret([1u8; 32]).unwrap(), AuthConfig::default());
    /// let _ = tokio_test::block_on(svc.register(RegisterInput { tenant_name: "Acme".into(), tenant_slug: "acme".into(), email: "u@e.com".into(), password: "Passw0rd".into() }));
    /// let session = tokio_test::block_on(svc.login(LoginInput { email: "u@e.com".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(session.tenant.slug, "acme");
    /// assert!(svc.verify_session(&session.token).is_some());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let email = models::user::normalize_email(&input.email);
        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(&input.password, dummy);
            }
            return Err(AuthError::Unauthorized);
        };

        let cred = self.repo
            .get_credentials(user.id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !verify_password(&input.password, &cred.password_hash) {
            return Err(AuthError::Unauthorized);
        }

        // Users still in onboarding have no tenant and cannot hold a session.
        let tenant_id = user.tenant_id.ok_or(AuthError::Unauthorized)?;
        let tenant = self.repo.find_tenant(tenant_id).await?.ok_or(AuthError::Unauthorized)?;

        if let Err(e) = self.repo.touch_last_login(user.id).await {
            warn!(user_id = %user.id, error = %e, "last_login_update_failed");
        }

        let iat = Utc::now().timestamp();
        let exp = iat + self.cfg.session_ttl_secs as i64;
        let claims = SessionClaims { uid: user.id, tid: tenant.id, slug: tenant.slug.clone(), role: user.role.as_str().to_string(), iat, exp };
        let token = self.codec.sign(Purpose::Session, &claims)?;
        let expires_at = Utc.timestamp_opt(exp, 0).single().unwrap_or_else(Utc::now);
        info!(user_id = %user.id, tenant_id = %tenant.id, "login_succeeded");
        Ok(AuthSession { user, tenant, token, expires_at })
    }

    /// Stateless check of a session cookie value: signature and expiry only.
    pub fn verify_session(&self, token: &str) -> Option<SessionClaims> {
        self.codec.verify(Purpose::Session, token)
    }

    /// Session cookie -> user + tenant rows. Any failure along the way is
    /// `None`; callers treat that as anonymous.
    #[instrument(skip_all)]
    pub async fn resolve_current_user(&self, token: &str) -> Option<CurrentUser> {
        let claims = self.verify_session(token)?;
        let user = match self.repo.find_user_by_id(claims.uid).await {
            Ok(u) => u?,
            Err(e) => {
                warn!(error = %e, "resolve_user_failed");
                return None;
            }
        };
        if user.tenant_id != Some(claims.tid) {
            return None;
        }
        let tenant = match self.repo.find_tenant(claims.tid).await {
            Ok(t) => t?,
            Err(e) => {
                warn!(error = %e, "resolve_tenant_failed");
                return None;
            }
        };
        Some(CurrentUser { user, tenant })
    }

    fn reset_fingerprint(&self, password_hash: &str) -> String {
        self.codec.keyed_hash(Purpose::PasswordReset, password_hash)[..16].to_string()
    }

    /// Start a password reset. Succeeds whether or not the email is known.
    #[instrument(skip(self, email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = models::user::normalize_email(email);
        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            debug!("password reset for unknown email ignored");
            return Ok(());
        };
        let current = self.repo.get_credentials(user.id).await?.map(|c| c.password_hash).unwrap_or_default();
        let iat = Utc::now().timestamp();
        let claims = ResetClaims {
            uid: user.id,
            fp: self.reset_fingerprint(&current),
            iat,
            exp: iat + self.cfg.password_reset_ttl_secs as i64,
        };
        let token = self.codec.sign(Purpose::PasswordReset, &claims)?;
        self.notifier.send_password_reset(&user.email, &token).await?;
        info!(user_id = %user.id, "password_reset_requested");
        Ok(())
    }

    /// Finish a password reset. Tokens minted for any other purpose, expired
    /// tokens and tokens already used are all [`AuthError::InvalidToken`].
    #[instrument(skip_all)]
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        check_password_policy(new_password)?;
        let claims: ResetClaims = self.codec.verify(Purpose::PasswordReset, token).ok_or(AuthError::InvalidToken)?;
        let user = self.repo.find_user_by_id(claims.uid).await?.ok_or(AuthError::InvalidToken)?;
        let current = self.repo.get_credentials(user.id).await?.map(|c| c.password_hash).unwrap_or_default();
        if !ct_eq(self.reset_fingerprint(&current).as_bytes(), claims.fp.as_bytes()) {
            return Err(AuthError::InvalidToken);
        }
        let hash = hash_password(new_password)?;
        self.repo.upsert_password(user.id, hash, self.cfg.password_algorithm.clone()).await?;
        info!(user_id = %user.id, "password_reset_completed");
        Ok(())
    }
}
