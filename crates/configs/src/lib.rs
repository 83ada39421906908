use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

/// Minimum length of the token-signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;
/// Upper bound for provisioning-code lifetime.
pub const MAX_PROVISION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Browser origins allowed to make credentialed cross-origin calls.
    /// Empty means no cross-origin access at all.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), cors_origins: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    /// Run pending migrations at startup.
    #[serde(default)]
    pub auto_migrate: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_acquire_timeout() -> u64 { 30 }

/// Session, cookie and provisioning settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret; falls back to `AUTH_SECRET`.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Older cookie names still accepted on read, tried in order after
    /// `cookie_name`. Migration debt: drop once old sessions have expired.
    #[serde(default = "default_legacy_cookie_names")]
    pub legacy_cookie_names: Vec<String>,
    /// `None` means "secure unless APP_ENV=development".
    #[serde(default)]
    pub cookie_secure: Option<bool>,
    #[serde(default = "default_provision_ttl")]
    pub provision_ttl_secs: u64,
    #[serde(default = "default_password_reset_ttl")]
    pub password_reset_ttl_secs: u64,
}

fn default_session_ttl() -> u64 { 12 * 60 * 60 }
fn default_cookie_name() -> String { "tg_session".into() }
fn default_legacy_cookie_names() -> Vec<String> {
    vec!["__Secure-tg_session".into(), "session".into()]
}
fn default_provision_ttl() -> u64 { 15 * 60 }
fn default_password_reset_ttl() -> u64 { 60 * 60 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            session_ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
            legacy_cookie_names: default_legacy_cookie_names(),
            cookie_secure: None,
            provision_ttl_secs: default_provision_ttl(),
            password_reset_ttl_secs: default_password_reset_ttl(),
        }
    }
}

/// Per-minute budgets for the in-process limiter.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_mobile_rpm")]
    pub mobile_per_minute: u32,
    #[serde(default = "default_login_rpm")]
    pub login_per_minute: u32,
    #[serde(default = "default_redeem_rpm")]
    pub redeem_per_minute: u32,
}

fn default_mobile_rpm() -> u32 { 120 }
fn default_login_rpm() -> u32 { 10 }
fn default_redeem_rpm() -> u32 { 10 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mobile_per_minute: default_mobile_rpm(),
            login_per_minute: default_login_rpm(),
            redeem_per_minute: default_redeem_rpm(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String { "compact".into() }

impl Default for LoggingConfig {
    fn default() -> Self { Self { format: default_log_format() } }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (a missing file is fine), overlay environment,
    /// then validate. Any error here is a misconfiguration and fatal.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        // 支持从环境变量填充 URL 与签名密钥
        self.database.normalize_from_env();
        self.database.validate()?;
        self.auth.normalize_from_env();
        self.auth.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.cors_origins = origins.split(',').map(str::to_string).collect();
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        let mut origins = Vec::with_capacity(self.cors_origins.len());
        for raw in &self.cors_origins {
            let origin = raw.trim().trim_end_matches('/');
            if origin.is_empty() {
                continue;
            }
            if origin == "*" || origin.contains('*') {
                return Err(anyhow!("server.cors_origins must list explicit origins, not wildcards"));
            }
            if !(origin.starts_with("https://") || origin.starts_with("http://")) {
                return Err(anyhow!("server.cors_origins entry {origin:?} must start with http:// or https://"));
            }
            origins.push(origin.to_string());
        }
        self.cors_origins = origins;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if self.secret.trim().is_empty() {
            if let Ok(secret) = std::env::var("AUTH_SECRET") {
                self.secret = secret;
            }
        }
        if self.cookie_secure.is_none() {
            let dev = std::env::var("APP_ENV").map(|v| v == "development").unwrap_or(false);
            self.cookie_secure = Some(!dev);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!(
                "auth.secret must be at least {MIN_SECRET_LEN} bytes; set it in config.toml or AUTH_SECRET"
            ));
        }
        if self.session_ttl_secs == 0 || self.password_reset_ttl_secs == 0 {
            return Err(anyhow!("auth ttl values must be positive"));
        }
        if self.provision_ttl_secs == 0 || self.provision_ttl_secs > MAX_PROVISION_TTL_SECS {
            return Err(anyhow!("auth.provision_ttl_secs must be within 1..={MAX_PROVISION_TTL_SECS}"));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(anyhow!("auth.cookie_name is empty"));
        }
        Ok(())
    }

    /// Session cookie names to try on read, current name first.
    pub fn cookie_candidates(&self) -> Vec<String> {
        let mut names = vec![self.cookie_name.clone()];
        for legacy in &self.legacy_cookie_names {
            if !names.contains(legacy) {
                names.push(legacy.clone());
            }
        }
        names
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mobile_per_minute == 0 || self.login_per_minute == 0 || self.redeem_per_minute == 0 {
            return Err(anyhow!("rate_limit budgets must be positive"));
        }
        Ok(())
    }
}
