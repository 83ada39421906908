mod support;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use support::*;

#[tokio::test]
async fn register_login_and_resolve_me() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;

    let res = send(&app, get("/api/admin/me", Some(&admin.cookie))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let me = &res.body["data"];
    assert_eq!(me["id"], admin.user_id.to_string());
    assert_eq!(me["tenantId"], admin.tenant_id.to_string());
    assert_eq!(me["tenantSlug"], "acme");
    assert_eq!(me["email"], "owner@acme.test");
    assert_eq!(me["role"], "OWNER");
    assert_eq!(res.body["ok"], true);
}

#[tokio::test]
async fn session_cookie_attributes() {
    let app = spawn_app();
    send(&app, post("/auth/register", json!({ "tenantName": "Acme", "tenantSlug": "acme", "email": "owner@acme.test", "password": PASSWORD }), None)).await;
    let res = send(&app, post("/auth/login", json!({ "email": "OWNER@acme.test", "password": PASSWORD }), None)).await;
    assert_eq!(res.status, StatusCode::OK);
    let cookie = res.set_cookies().into_iter().find(|c| c.starts_with("tg_session=")).unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains(&format!("Max-Age={}", 12 * 60 * 60)));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    signup_and_login(&app, "acme").await;

    let wrong_pw = send(&app, post("/auth/login", json!({ "email": "owner@acme.test", "password": "nope-nope" }), None)).await;
    let no_user = send(&app, post("/auth/login", json!({ "email": "ghost@acme.test", "password": "nope-nope" }), None)).await;

    assert_eq!(wrong_pw.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw.status, no_user.status);
    assert_eq!(wrong_pw.code(), "UNAUTHORIZED");
    assert_eq!(wrong_pw.body_without_trace(), no_user.body_without_trace());
    assert!(wrong_pw.set_cookies().is_empty());
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = spawn_app();
    signup_and_login(&app, "acme").await;
    let res = send(
        &app,
        post("/auth/register", json!({ "tenantName": "Other", "tenantSlug": "acme-2", "email": "owner@acme.test", "password": PASSWORD }), None),
    )
    .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "CONFLICT");
}

#[tokio::test]
async fn weak_signup_input_is_validation_error() {
    let app = spawn_app();
    let res = send(&app, post("/auth/register", json!({ "tenantName": "Acme", "tenantSlug": "A!", "email": "x@y.test", "password": PASSWORD }), None)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION");
}

#[tokio::test]
async fn malformed_json_is_invalid_body() {
    let app = spawn_app();
    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "INVALID_BODY");
    assert_eq!(res.body["ok"], false);
}

#[tokio::test]
async fn logout_expires_every_candidate_cookie() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;
    let cookie = format!("{}; tg_session.0=abc; tg_session.1=def", admin.cookie);

    let res = send(&app, request(Method::POST, "/auth/logout", None, Some(&cookie))).await;
    assert_eq!(res.status, StatusCode::OK);
    let cleared = res.set_cookies();
    for name in ["tg_session=", "__Secure-tg_session=", "session=", "tg_session.0=", "tg_session.1="] {
        let c = cleared.iter().find(|c| c.starts_with(name)).unwrap_or_else(|| panic!("{name} not cleared"));
        assert!(c.contains("Max-Age=0"), "{c}");
    }
    // the test app runs with cookie_secure=false; prefixed names still need Secure
    let prefixed = cleared.iter().find(|c| c.starts_with("__Secure-tg_session=")).unwrap();
    assert!(prefixed.contains("Secure"), "{prefixed}");
    let plain = cleared.iter().find(|c| c.starts_with("session=")).unwrap();
    assert!(!plain.contains("Secure"), "{plain}");

    // idempotent without any session
    let res = send(&app, request(Method::POST, "/auth/logout", None, None)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn legacy_cookie_name_is_accepted() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;
    let legacy = admin.cookie.replacen("tg_session=", "session=", 1);
    let res = send(&app, get("/api/admin/me", Some(&legacy))).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = spawn_app();
    signup_and_login(&app, "acme").await;

    let res = send(&app, post("/auth/password-reset/request", json!({ "email": "owner@acme.test" }), None)).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let unknown = send(&app, post("/auth/password-reset/request", json!({ "email": "ghost@acme.test" }), None)).await;
    assert_eq!(unknown.status, StatusCode::ACCEPTED);
    assert_eq!(res.body_without_trace(), unknown.body_without_trace());

    let token = app.notifier.last_token_for("owner@acme.test").unwrap();
    let res = send(&app, post("/auth/password-reset/confirm", json!({ "token": token, "password": "N3w-password" }), None)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    // single use
    let again = send(&app, post("/auth/password-reset/confirm", json!({ "token": token, "password": "An0ther-one" }), None)).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.code(), "VALIDATION");

    let old = send(&app, post("/auth/login", json!({ "email": "owner@acme.test", "password": PASSWORD }), None)).await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = send(&app, post("/auth/login", json!({ "email": "owner@acme.test", "password": "N3w-password" }), None)).await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn session_token_is_not_a_reset_token() {
    let app = spawn_app();
    let admin = signup_and_login(&app, "acme").await;
    let session_token = admin.cookie.trim_start_matches("tg_session=").to_string();
    let res = send(&app, post("/auth/password-reset/confirm", json!({ "token": session_token, "password": "N3w-password" }), None)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_is_rate_limited_per_email() {
    let mut cfg = config();
    cfg.rate_limit.login_per_minute = 2;
    let app = spawn_app_with(cfg);
    for _ in 0..2 {
        let res = send(&app, post("/auth/login", json!({ "email": "a@b.test", "password": "whatever1" }), None)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }
    let res = send(&app, post("/auth/login", json!({ "email": "A@b.test", "password": "whatever1" }), None)).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.code(), "RATE_LIMITED");
    assert!(res.headers.contains_key(header::RETRY_AFTER));

    let other = send(&app, post("/auth/login", json!({ "email": "c@d.test", "password": "whatever1" }), None)).await;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);
}
