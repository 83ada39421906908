use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use migration::{Migrator, MigratorTrait};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use configs::{AppConfig, ServerConfig};
use service::ratelimit::InMemoryRateLimiter;

use crate::errors::StartupError;
use crate::routes;
use crate::state::ServerState;

const MAINTENANCE_EVERY: Duration = Duration::from_secs(5 * 60);

/// Credentialed CORS for the configured origins only. Any other `Origin`
/// gets no `access-control-allow-origin`, so browsers withhold the response.
pub fn build_cors(cfg: &ServerConfig) -> Result<CorsLayer, StartupError> {
    let origins = cfg
        .cors_origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| StartupError::InvalidConfig(format!("cors origin {o:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::gate::API_KEY_HEADER),
            HeaderName::from_static(crate::trace::TRACE_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(crate::trace::TRACE_ID_HEADER)]))
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Periodic housekeeping: drop expired provisioning codes and idle limiter
/// buckets. Neither is needed for correctness.
fn spawn_maintenance(state: ServerState, limiter: Arc<InMemoryRateLimiter>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(MAINTENANCE_EVERY);
        tick.tick().await;
        loop {
            tick.tick().await;
            if let Err(e) = state.mobile.purge_expired_provision_tokens().await {
                warn!(error = %e, "provision_token_purge_failed");
            }
            let swept = limiter.sweep();
            if swept > 0 {
                info!(swept, "rate_limit_buckets_swept");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c handler failed");
    }
    info!("shutdown signal received");
}

/// Assemble the application from configuration: connect, migrate, wire state.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let db = models::db::connect_with_config(&cfg.database).await?;
    if cfg.database.auto_migrate {
        Migrator::up(&db, None).await.map_err(anyhow::Error::from)?;
        info!("migrations applied");
    }

    let limiter = Arc::new(InMemoryRateLimiter::new());
    let state = ServerState::from_parts(
        cfg,
        Arc::new(service::auth::repo::seaorm::SeaOrmAuthRepository::new(db.clone())),
        Arc::new(service::mobile::repo::seaorm::SeaOrmMobileRepository::new(db)),
        limiter.clone(),
    )
    .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;

    spawn_maintenance(state.clone(), limiter);
    let cors = build_cors(&cfg.server)?;
    Ok(routes::build_router(state, cors))
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let app = build_app(&cfg).await?;
    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(anyhow::Error::from)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)?;
    info!("server stopped");
    Ok(())
}
