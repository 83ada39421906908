#![cfg(test)]
use tokio::sync::OnceCell;
use sea_orm::DatabaseConnection;
use migration::MigratorTrait;
use models::db::{connect_with_config, DatabaseConfig, DATABASE_URL};

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<bool> = OnceCell::const_new();

fn test_config(url: &str) -> DatabaseConfig {
    DatabaseConfig {
        url: url.to_string(),
        max_connections: 20,
        min_connections: 1,
        connect_timeout_secs: 10,
        idle_timeout_secs: 60,
        acquire_timeout_secs: 10,
        sqlx_logging: false,
        auto_migrate: false,
    }
}

/// A migrated database, or `None` when DB tests are disabled
/// (`SKIP_DB_TESTS` set or no `DATABASE_URL`).
pub async fn get_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let url = DATABASE_URL.as_ref()?;

    // Run migrations exactly once, with a throwaway connection
    let migrated = *MIGRATED
        .get_or_init(|| async {
            let Ok(db) = connect_with_config(&test_config(url)).await else { return false };
            migration::Migrator::up(&db, None).await.is_ok()
        })
        .await;
    if !migrated {
        return None;
    }

    // Return a fresh connection for the current test's runtime
    connect_with_config(&test_config(url)).await.ok()
}
