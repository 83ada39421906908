mod support;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Utc;
use uuid::Uuid;

use service::token::{Purpose, SessionClaims, TokenCodec};
use support::*;

#[tokio::test]
async fn admin_ui_without_session_redirects_with_next() {
    let app = spawn_app();
    let res = send(&app, get("/admin/devices?tab=keys", None)).await;
    assert!(res.status.is_redirection());
    assert_eq!(res.headers[header::LOCATION], "/login?next=%2Fadmin%2Fdevices%3Ftab%3Dkeys");
}

#[tokio::test]
async fn admin_api_without_session_is_401_json() {
    let app = spawn_app();
    let res = send(&app, get("/api/admin/mobile/keys", None)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "UNAUTHENTICATED");
    assert!(res.headers.get(header::LOCATION).is_none());
}

#[tokio::test]
async fn expired_or_tampered_session_is_no_session() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;

    let codec = TokenCodec::from_secret(SECRET).unwrap();
    let now = Utc::now().timestamp();
    let expired = SessionClaims { uid: admin.user_id, tid: admin.tenant_id, slug: "acme".into(), role: "OWNER".into(), iat: now - 100, exp: now - 1 };
    let expired = format!("tg_session={}", codec.sign(Purpose::Session, &expired).unwrap());
    let res = send(&app, get("/api/admin/me", Some(&expired))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = send(&app, get("/admin", Some(&expired))).await;
    assert!(res.status.is_redirection());

    let mut tampered = admin.cookie.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    let res = send(&app, get("/api/admin/me", Some(&tampered))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let foreign = TokenCodec::from_secret("some-other-secret-of-enough-length!!").unwrap();
    let claims = SessionClaims { uid: admin.user_id, tid: admin.tenant_id, slug: "acme".into(), role: "OWNER".into(), iat: now, exp: now + 600 };
    let forged = format!("tg_session={}", foreign.sign(Purpose::Session, &claims).unwrap());
    let res = send(&app, get("/api/admin/me", Some(&forged))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn spoofed_identity_headers_are_overwritten() {
    let app = spawn_app();
    let acme = signup_and_login(&app, "acme").await;
    let globex = signup_and_login(&app, "globex").await;
    let (_, device_id, _) = create_device_key(&app, &globex, "Globex tablet").await;

    // acme's session plus headers claiming to be globex
    let req = Request::builder()
        .uri(format!("/api/admin/mobile/devices/{device_id}"))
        .header(header::COOKIE, &acme.cookie)
        .header("x-tenant-id", globex.tenant_id.to_string())
        .header("x-tenant-slug", "globex")
        .header("x-user-id", globex.user_id.to_string())
        .header("x-user-role", "OWNER")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let req = Request::builder()
        .uri("/api/admin/me")
        .header(header::COOKIE, &acme.cookie)
        .header("x-tenant-id", globex.tenant_id.to_string())
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["tenantId"], acme.tenant_id.to_string());
}

#[tokio::test]
async fn headers_alone_never_authenticate() {
    let app = spawn_app();
    let req = Request::builder()
        .uri("/api/admin/mobile/devices")
        .header("x-user-id", Uuid::new_v4().to_string())
        .header("x-tenant-id", Uuid::new_v4().to_string())
        .header("x-user-role", "OWNER")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trace_id_is_echoed_or_generated() {
    let app = spawn_app();
    let req = Request::builder().uri("/api/admin/me").header("x-trace-id", "abc-123").body(Body::empty()).unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.headers["x-trace-id"], "abc-123");
    assert_eq!(res.body["traceId"], "abc-123");

    let res = send(&app, get("/nope", None)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let generated = res.headers["x-trace-id"].to_str().unwrap().to_string();
    assert!(!generated.is_empty());
    assert_eq!(res.body["traceId"], generated);
}

#[tokio::test]
async fn bypassed_paths_need_no_credentials() {
    let app = spawn_app();
    let res = send(&app, get("/health", None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["status"], "ok");

    let res = send(&app, get("/metrics", None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));

    let res = send(&app, get("/api-docs/openapi.json", None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["paths"]["/api/mobile/provision/redeem"].is_object());
}

#[tokio::test]
async fn foreign_origin_gets_no_cors_grant() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;

    let req = Request::builder()
        .uri("/api/admin/me")
        .header(header::COOKIE, &admin.cookie)
        .header(header::ORIGIN, "https://evil.acme.test")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert!(res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/admin/mobile/keys")
        .header(header::ORIGIN, "https://evil.acme.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert!(res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let req = Request::builder()
        .uri("/api/admin/me")
        .header(header::COOKIE, &admin.cookie)
        .header(header::ORIGIN, ADMIN_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ADMIN_ORIGIN);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
