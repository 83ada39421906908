//! Request gate: the single choke point that resolves identity before any
//! handler runs.
//!
//! Per request: strip client-supplied identity headers, classify the path,
//! authenticate (session cookie or `x-api-key`), then either reject
//! (redirect for the admin UI, 401 JSON for APIs) or forward with verified
//! headers plus a typed [`Identity`] in the request extensions.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use uuid::Uuid;

use service::mobile::domain::MobileIdentity;
use service::mobile::errors::MobileError;
use service::token::SessionClaims;

use crate::errors::ApiError;
use crate::metrics::{record_auth, record_gate, RATE_LIMITED_TOTAL};
use crate::state::ServerState;

pub const H_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const H_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");
pub const H_TENANT_SLUG: HeaderName = HeaderName::from_static("x-tenant-slug");
pub const H_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
pub const H_DEVICE_ID: HeaderName = HeaderName::from_static("x-device-id");
pub const H_API_KEY_ID: HeaderName = HeaderName::from_static("x-api-key-id");
pub const API_KEY_HEADER: &str = "x-api-key";

/// Headers only the gate may set.
const TRUSTED_HEADERS: [HeaderName; 6] = [H_USER_ID, H_TENANT_ID, H_TENANT_SLUG, H_USER_ROLE, H_DEVICE_ID, H_API_KEY_ID];

pub const DEVICE_ROLE: &str = "DEVICE";
const LOGIN_PATH: &str = "/login";
const DEFAULT_NEXT: &str = "/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Bypass,
    AdminUi,
    AdminApi,
    MobileApi,
    Public,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Bypass => "bypass",
            RouteClass::AdminUi => "admin_ui",
            RouteClass::AdminApi => "admin_api",
            RouteClass::MobileApi => "mobile_api",
            RouteClass::Public => "public",
        }
    }
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(path: &str) -> RouteClass {
    const BYPASS_EXACT: [&str; 5] = ["/health", "/metrics", "/favicon.ico", LOGIN_PATH, "/api/mobile/provision/redeem"];
    const BYPASS_PREFIX: [&str; 4] = ["/docs", "/api-docs", "/static", "/auth"];

    if BYPASS_EXACT.contains(&path) || BYPASS_PREFIX.iter().any(|p| under(path, p)) {
        RouteClass::Bypass
    } else if under(path, "/api/admin") {
        RouteClass::AdminApi
    } else if under(path, "/api/mobile") {
        RouteClass::MobileApi
    } else if under(path, "/admin") {
        RouteClass::AdminUi
    } else {
        RouteClass::Public
    }
}

/// Verified caller identity, the typed twin of the trusted headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin(AdminIdentity),
    Device(MobileIdentity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub tenant_slug: String,
    pub role: String,
}

impl Identity {
    pub fn tenant_id(&self) -> Uuid {
        match self {
            Identity::Admin(a) => a.tenant_id,
            Identity::Device(d) => d.tenant_id,
        }
    }

    pub fn tenant_slug(&self) -> &str {
        match self {
            Identity::Admin(a) => &a.tenant_slug,
            Identity::Device(d) => &d.tenant_slug,
        }
    }
}

impl From<SessionClaims> for AdminIdentity {
    fn from(c: SessionClaims) -> Self {
        Self { user_id: c.uid, tenant_id: c.tid, tenant_slug: c.slug, role: c.role }
    }
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    for h in TRUSTED_HEADERS.iter() {
        headers.remove(h);
    }
}

fn put(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    // values that are not valid header text are dropped, never forwarded raw
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
}

/// Strip-then-set: the only place trusted headers are written.
fn set_verified_identity(req: &mut Request, identity: Identity) {
    let headers = req.headers_mut();
    strip_identity_headers(headers);
    match &identity {
        Identity::Admin(a) => {
            put(headers, H_USER_ID, &a.user_id.to_string());
            put(headers, H_TENANT_ID, &a.tenant_id.to_string());
            put(headers, H_TENANT_SLUG, &a.tenant_slug);
            put(headers, H_USER_ROLE, &a.role);
        }
        Identity::Device(d) => {
            put(headers, H_TENANT_ID, &d.tenant_id.to_string());
            put(headers, H_TENANT_SLUG, &d.tenant_slug);
            put(headers, H_USER_ROLE, DEVICE_ROLE);
            put(headers, H_DEVICE_ID, &d.device_id.to_string());
            put(headers, H_API_KEY_ID, &d.api_key_id.to_string());
        }
    }
    req.extensions_mut().insert(identity);
}

/// Session cookie value, trying each candidate name in order. A name may
/// also arrive split as `name.0`, `name.1`, ... by hosts that chunk large
/// cookies.
pub fn read_session_cookie(headers: &HeaderMap, candidates: &[String]) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    for name in candidates {
        if let Some(c) = jar.get(name).filter(|c| !c.value().is_empty()) {
            return Some(c.value().to_string());
        }
        let mut joined = String::new();
        let mut i = 0;
        while let Some(part) = jar.get(&format!("{name}.{i}")) {
            joined.push_str(part.value());
            i += 1;
        }
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    None
}

/// Internal path (+query) to come back to after login. Anything that could
/// leave the site falls back to the admin home.
pub fn safe_next(candidate: &str) -> &str {
    let internal = candidate.starts_with('/')
        && !candidate.starts_with("//")
        && !candidate.contains('\\')
        && !candidate.bytes().any(|b| b.is_ascii_control());
    if internal { candidate } else { DEFAULT_NEXT }
}

pub fn login_redirect(next: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(safe_next(next).as_bytes()).collect();
    Redirect::to(&format!("{LOGIN_PATH}?next={encoded}")).into_response()
}

pub async fn request_gate(State(state): State<ServerState>, mut req: Request, next: Next) -> Response {
    strip_identity_headers(req.headers_mut());
    let class = classify(req.uri().path());

    match class {
        RouteClass::Bypass | RouteClass::Public => {
            record_gate(class.as_str(), "pass");
            next.run(req).await
        }
        RouteClass::AdminUi | RouteClass::AdminApi => {
            let claims = read_session_cookie(req.headers(), &state.http.cookie_candidates)
                .and_then(|token| state.auth.verify_session(&token));
            let Some(claims) = claims else {
                record_gate(class.as_str(), "reject");
                debug!(path = %req.uri().path(), "no valid session");
                if class == RouteClass::AdminUi {
                    let wanted = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or(DEFAULT_NEXT).to_string();
                    return login_redirect(&wanted);
                }
                return ApiError::unauthenticated().into_response();
            };
            record_gate(class.as_str(), "allow");
            set_verified_identity(&mut req, Identity::Admin(claims.into()));
            next.run(req).await
        }
        RouteClass::MobileApi => {
            let raw = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
            let Some(raw) = raw else {
                record_gate(class.as_str(), "reject");
                return ApiError::unauthenticated().into_response();
            };
            let identity = match state.mobile.authenticate(&raw).await {
                Ok(identity) => identity,
                Err(MobileError::Unauthenticated) => {
                    record_auth("api_key", false);
                    record_gate(class.as_str(), "reject");
                    return ApiError::unauthenticated().into_response();
                }
                Err(e) => {
                    warn!(error = %e, "api key lookup failed");
                    return ApiError::from(e).into_response();
                }
            };
            record_auth("api_key", true);

            let decision = state.rate_check(&format!("mobile:{}", identity.api_key_id), state.http.rate_limit.mobile_per_minute).await;
            if !decision.allowed {
                RATE_LIMITED_TOTAL.inc();
                record_gate(class.as_str(), "rate_limited");
                return ApiError::rate_limited(decision.retry_after_secs).into_response();
            }

            record_gate(class.as_str(), "allow");
            req.headers_mut().remove(API_KEY_HEADER);
            set_verified_identity(&mut req, Identity::Device(identity));
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(classify("/health"), RouteClass::Bypass);
        assert_eq!(classify("/auth/login"), RouteClass::Bypass);
        assert_eq!(classify("/login"), RouteClass::Bypass);
        assert_eq!(classify("/docs/index.html"), RouteClass::Bypass);
        assert_eq!(classify("/api/mobile/provision/redeem"), RouteClass::Bypass);
        assert_eq!(classify("/admin"), RouteClass::AdminUi);
        assert_eq!(classify("/admin/devices"), RouteClass::AdminUi);
        assert_eq!(classify("/administrator"), RouteClass::Public);
        assert_eq!(classify("/api/admin/me"), RouteClass::AdminApi);
        assert_eq!(classify("/api/mobile/me"), RouteClass::MobileApi);
        assert_eq!(classify("/authx"), RouteClass::Public);
        assert_eq!(classify("/"), RouteClass::Public);
    }

    #[test]
    fn next_must_stay_internal() {
        assert_eq!(safe_next("/admin/devices?x=1"), "/admin/devices?x=1");
        assert_eq!(safe_next("https://evil.test/"), DEFAULT_NEXT);
        assert_eq!(safe_next("//evil.test/"), DEFAULT_NEXT);
        assert_eq!(safe_next("/\\evil.test"), DEFAULT_NEXT);
        assert_eq!(safe_next("admin"), DEFAULT_NEXT);
    }

    #[test]
    fn redirect_encodes_next() {
        let res = login_redirect("/admin/devices?tab=keys&x=1");
        assert_eq!(res.headers()["location"], "/login?next=%2Fadmin%2Fdevices%3Ftab%3Dkeys%26x%3D1");
    }

    #[test]
    fn cookie_candidates_in_order_and_chunked() {
        let names = vec!["tg_session".to_string(), "session".to_string()];
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("session=legacy; tg_session=current"));
        assert_eq!(read_session_cookie(&h, &names).as_deref(), Some("current"));

        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("session=legacy"));
        assert_eq!(read_session_cookie(&h, &names).as_deref(), Some("legacy"));

        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("tg_session.1=def; tg_session.0=abc"));
        assert_eq!(read_session_cookie(&h, &names).as_deref(), Some("abcdef"));

        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("tg_session="));
        assert_eq!(read_session_cookie(&h, &names), None);
    }
}
