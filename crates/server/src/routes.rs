pub mod admin;
pub mod auth;
pub mod mobile;

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;

use crate::errors::{ok, ApiError, ApiOk};
use crate::gate::request_gate;
use crate::metrics::metrics_handler;
use crate::openapi::ApiDoc;
use crate::state::ServerState;
use crate::trace::trace_id;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Service is up", body = crate::openapi::HealthResponse)))]
pub async fn health() -> ApiOk<Health> {
    ok(Health { status: "ok" })
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found()
}

/// Build the full application router. Layer order, outermost first:
/// http trace, CORS, trace id, request gate, handlers.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/password-reset/request", post(auth::request_password_reset))
        .route("/password-reset/confirm", post(auth::confirm_password_reset));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .nest("/auth", auth_routes)
        .nest("/api/admin", admin::router())
        .nest("/api/mobile", mobile::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), request_gate))
        .with_state(state)
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 失败（5xx 等）时以 ERROR 记录
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
