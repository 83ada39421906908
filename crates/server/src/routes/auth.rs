//! Browser-facing signup, login/logout and password reset.

use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use service::auth::domain::{LoginInput, RegisterInput};

use crate::errors::{ok, ApiError, ApiJson, ApiOk, ApiResult};
use crate::metrics::{record_auth, RATE_LIMITED_TOTAL};
use crate::state::ServerState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutput {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetConfirm {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Done {
    pub done: bool,
}

/// Browsers drop `__Secure-`/`__Host-` cookies set without `Secure`.
fn secure_for(name: &str, configured: bool) -> bool {
    configured || name.starts_with("__Secure-") || name.starts_with("__Host-")
}

fn session_cookie(state: &ServerState, token: String) -> Cookie<'static> {
    let secure = secure_for(&state.http.cookie_name, state.http.cookie_secure);
    Cookie::build((state.http.cookie_name.clone(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(state.http.session_ttl_secs as i64))
        .build()
}

fn expired_cookie(name: String, secure: bool) -> Cookie<'static> {
    let secure = secure_for(&name, secure);
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

#[utoipa::path(post, path = "/auth/register", tag = "auth", request_body = RegisterRequest,
    responses((status = 201, description = "Tenant and owner created", body = SessionOutput), (status = 400, description = "Validation failed"), (status = 409, description = "Slug or email taken")))]
pub async fn register(State(state): State<ServerState>, ApiJson(req): ApiJson<RegisterRequest>) -> ApiResult<SessionOutput> {
    let input = RegisterInput { tenant_name: req.tenant_name, tenant_slug: req.tenant_slug, email: req.email, password: req.password };
    let created = state.auth.register(input).await?;
    Ok(ApiOk(StatusCode::CREATED, SessionOutput { user_id: created.user.id, tenant_id: created.tenant.id }))
}

#[utoipa::path(post, path = "/auth/login", tag = "auth", request_body = LoginRequest,
    responses((status = 200, description = "Session cookie set", body = SessionOutput), (status = 401, description = "Invalid email or password"), (status = 429, description = "Too many attempts")))]
pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(CookieJar, ApiOk<SessionOutput>), ApiError> {
    let email = models::user::normalize_email(&req.email);
    let decision = state.rate_check(&format!("login:{email}"), state.http.rate_limit.login_per_minute).await;
    if !decision.allowed {
        RATE_LIMITED_TOTAL.inc();
        return Err(ApiError::rate_limited(decision.retry_after_secs));
    }

    let session = match state.auth.login(LoginInput { email, password: req.password }).await {
        Ok(s) => s,
        Err(e) => {
            record_auth("session", false);
            return Err(e.into());
        }
    };
    record_auth("session", true);

    let out = SessionOutput { user_id: session.user.id, tenant_id: session.tenant.id };
    Ok((jar.add(session_cookie(&state, session.token)), ok(out)))
}

/// Expire every recognized session cookie, including chunked parts.
#[utoipa::path(post, path = "/auth/logout", tag = "auth", responses((status = 200, description = "Session cookies cleared", body = Done)))]
pub async fn logout(State(state): State<ServerState>, jar: CookieJar) -> (CookieJar, ApiOk<Done>) {
    let secure = state.http.cookie_secure;
    let chunks: Vec<String> = jar
        .iter()
        .map(|c| c.name().to_string())
        .filter(|n| {
            state.http.cookie_candidates.iter().any(|base| {
                n.strip_prefix(base.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
            })
        })
        .collect();

    let mut jar = jar;
    for name in state.http.cookie_candidates.iter().cloned().chain(chunks) {
        jar = jar.add(expired_cookie(name, secure));
    }
    info!("logout");
    (jar, ok(Done { done: true }))
}

#[utoipa::path(post, path = "/auth/password-reset/request", tag = "auth", request_body = ResetRequest,
    responses((status = 202, description = "Accepted whether or not the email exists", body = Done)))]
pub async fn request_password_reset(State(state): State<ServerState>, ApiJson(req): ApiJson<ResetRequest>) -> ApiResult<Done> {
    state.auth.request_password_reset(&req.email).await?;
    Ok(ApiOk(StatusCode::ACCEPTED, Done { done: true }))
}

#[utoipa::path(post, path = "/auth/password-reset/confirm", tag = "auth", request_body = ResetConfirm,
    responses((status = 200, description = "Password changed", body = Done), (status = 400, description = "Invalid or expired token")))]
pub async fn confirm_password_reset(State(state): State<ServerState>, ApiJson(req): ApiJson<ResetConfirm>) -> ApiResult<Done> {
    state.auth.confirm_password_reset(&req.token, &req.password).await?;
    Ok(ok(Done { done: true }))
}
