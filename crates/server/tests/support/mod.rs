#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use configs::AppConfig;
use server::routes::build_router;
use server::startup::build_cors;
use server::ServerState;
use service::auth::notifier::mock::RecordingNotifier;
use service::auth::repository::{mock::MockAuthRepository, AuthRepository};
use service::auth::service::{AuthConfig, AuthService};
use service::mobile::repository::mock::MockMobileRepository;
use service::ratelimit::InMemoryRateLimiter;
use service::token::TokenCodec;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "Secret123!";
pub const ADMIN_ORIGIN: &str = "https://admin.acme.test";

pub struct TestApp {
    pub router: Router,
    pub mobile_repo: Arc<MockMobileRepository>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.secret = SECRET.into();
    cfg.auth.cookie_secure = Some(false);
    cfg.server.cors_origins = vec![ADMIN_ORIGIN.into()];
    cfg
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(config())
}

pub fn spawn_app_with(cfg: AppConfig) -> TestApp {
    let auth_repo = Arc::new(MockAuthRepository::default());
    let mobile_repo = Arc::new(MockMobileRepository::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut state = ServerState::from_parts(&cfg, auth_repo.clone(), mobile_repo.clone(), Arc::new(InMemoryRateLimiter::new())).unwrap();
    let auth_repo: Arc<dyn AuthRepository> = auth_repo;
    let auth = AuthService::new(auth_repo, TokenCodec::from_secret(SECRET).unwrap(), AuthConfig::from(&cfg.auth)).with_notifier(notifier.clone());
    state.auth = Arc::new(auth);
    let router = build_router(state, build_cors(&cfg.server).unwrap());
    TestApp { router, mobile_repo, notifier }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    /// Body with the per-request trace id removed, for byte-for-byte comparisons.
    pub fn body_without_trace(&self) -> Value {
        let mut b = self.body.clone();
        if let Some(obj) = b.as_object_mut() {
            obj.remove("traceId");
        }
        b
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers.get_all(header::SET_COOKIE).iter().filter_map(|v| v.to_str().ok()).map(str::to_string).collect()
    }
}

pub async fn send(app: &TestApp, req: Request<Body>) -> Reply {
    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, headers, body }
}

pub fn request(method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    match body {
        Some(v) => b.header(header::CONTENT_TYPE, "application/json").body(Body::from(v.to_string())).unwrap(),
        None => b.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, None, cookie)
}

pub fn post(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    request(Method::POST, uri, Some(body), cookie)
}

pub fn with_api_key(uri: &str, key: &str) -> Request<Body> {
    Request::builder().uri(uri).header("x-api-key", key).body(Body::empty()).unwrap()
}

pub struct Admin {
    pub cookie: String,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

/// Sign up a tenant, mirror it into the mobile store and log in.
pub async fn signup_and_login(app: &TestApp, slug: &str) -> Admin {
    let email = format!("owner@{slug}.test");
    let res = send(
        app,
        post("/auth/register", json!({ "tenantName": slug, "tenantSlug": slug, "email": email, "password": PASSWORD }), None),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let tenant_id: Uuid = res.body["data"]["tenantId"].as_str().unwrap().parse().unwrap();
    app.mobile_repo.insert_tenant(tenant_id, slug);

    let res = send(app, post("/auth/login", json!({ "email": email, "password": PASSWORD }), None)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let cookie = res
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("tg_session="))
        .and_then(|c| c.split(';').next().map(str::to_string))
        .unwrap();
    let user_id = res.body["data"]["userId"].as_str().unwrap().parse().unwrap();
    Admin { cookie, tenant_id, user_id }
}

/// Create a key bound to a new device; returns `(key id, device id, plaintext)`.
pub async fn create_device_key(app: &TestApp, admin: &Admin, device: &str) -> (Uuid, Uuid, String) {
    let res = send(app, post("/api/admin/mobile/keys", json!({ "name": "Front desk", "deviceName": device }), Some(&admin.cookie))).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let d = &res.body["data"];
    (
        d["key"]["id"].as_str().unwrap().parse().unwrap(),
        d["device"]["id"].as_str().unwrap().parse().unwrap(),
        d["apiKey"].as_str().unwrap().to_string(),
    )
}
