use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub use configs::DatabaseConfig;

pub static DATABASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    // Load .env if present
    let _ = dotenvy::dotenv();
    env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty())
});

/// Connect with pool settings from configuration.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
        .sqlx_logging(cfg.sqlx_logging);
    let db = Database::connect(opts).await?;
    Ok(db)
}

/// Connect using `DATABASE_URL` only. `None` when it is not set, which
/// DB-backed tests treat as "skip".
pub async fn connect_from_env() -> anyhow::Result<Option<DatabaseConnection>> {
    match DATABASE_URL.as_ref() {
        Some(url) => Ok(Some(Database::connect(url.as_str()).await?)),
        None => Ok(None),
    }
}
