use std::sync::Arc;
use std::time::Duration;

use configs::{AppConfig, RateLimitConfig};
use service::auth::repository::AuthRepository;
use service::auth::service::{AuthConfig, AuthService};
use service::mobile::repository::MobileRepository;
use service::mobile::service::{MobileConfig, MobileService};
use service::ratelimit::{RateDecision, RateLimitStore};
use service::token::{TokenCodec, TokenError};

/// Cookie and limiter settings the HTTP layer needs at request time.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub cookie_name: String,
    /// Current name first, then legacy names.
    pub cookie_candidates: Vec<String>,
    pub cookie_secure: bool,
    pub session_ttl_secs: u64,
    pub rate_limit: RateLimitConfig,
}

impl From<&AppConfig> for HttpSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            cookie_name: cfg.auth.cookie_name.clone(),
            cookie_candidates: cfg.auth.cookie_candidates(),
            cookie_secure: cfg.auth.cookie_secure.unwrap_or(true),
            session_ttl_secs: cfg.auth.session_ttl_secs,
            rate_limit: cfg.rate_limit.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub auth: Arc<AuthService<dyn AuthRepository>>,
    pub mobile: Arc<MobileService<dyn MobileRepository>>,
    pub limiter: Arc<dyn RateLimitStore>,
    pub http: Arc<HttpSettings>,
}

const WINDOW: Duration = Duration::from_secs(60);

impl ServerState {
    /// Assemble state from already-built repositories.
    pub fn from_parts(
        cfg: &AppConfig,
        auth_repo: Arc<dyn AuthRepository>,
        mobile_repo: Arc<dyn MobileRepository>,
        limiter: Arc<dyn RateLimitStore>,
    ) -> Result<Self, TokenError> {
        let codec = TokenCodec::from_secret(cfg.auth.secret.as_bytes())?;
        Ok(Self {
            auth: Arc::new(AuthService::new(auth_repo, codec.clone(), AuthConfig::from(&cfg.auth))),
            mobile: Arc::new(MobileService::new(mobile_repo, codec, MobileConfig::from(&cfg.auth))),
            limiter,
            http: Arc::new(HttpSettings::from(cfg)),
        })
    }

    /// Count a hit against `key` using a per-minute budget.
    pub async fn rate_check(&self, key: &str, per_minute: u32) -> RateDecision {
        self.limiter.hit(key, per_minute, WINDOW).await
    }
}
