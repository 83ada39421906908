//! Tenant-scoped admin API under `/api/admin`. Every handler takes an
//! [`AdminContext`] and passes its tenant id into the service, so lookups
//! are always `(id, tenant)`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use service::mobile::domain::{ApiKeyRecord, DeviceRecord, KeyStatus, ProvisionRecord, DeviceStatus, ProvisionStatus};

use crate::errors::{ok, ApiError, ApiJson, ApiOk, ApiResult};
use crate::gate::read_session_cookie;
use crate::guard::{AdminContext, ResourceId};
use crate::state::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/me", get(me))
        .route("/mobile/keys", get(list_keys).post(create_key))
        .route("/mobile/keys/:id", delete(delete_key))
        .route("/mobile/keys/:id/revoke", post(revoke_key))
        .route("/mobile/devices", get(list_devices))
        .route("/mobile/devices/:id", get(get_device))
        .route("/mobile/devices/:id/active-event", put(set_active_event))
        .route("/mobile/provision-tokens", get(list_provision_tokens).post(issue_provision_token))
        .route("/mobile/provision-tokens/:id/acknowledge", post(acknowledge_provision_token))
        .route("/mobile/provision-tokens/:id/revoke", post(revoke_provision_token))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeOutput {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub tenant_id: Uuid,
    pub tenant_slug: String,
    pub tenant_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyView {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    #[schema(value_type = String, example = "ACTIVE")]
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRecord> for ApiKeyView {
    fn from(k: ApiKeyRecord) -> Self {
        Self { id: k.id, name: k.name, prefix: k.prefix, status: k.status, created_at: k.created_at, revoked_at: k.revoked_at, last_used_at: k.last_used_at }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: Uuid,
    pub name: String,
    pub api_key_id: Option<Uuid>,
    #[schema(value_type = String, example = "ACTIVE")]
    pub status: DeviceStatus,
    pub active_event_id: Option<Uuid>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DeviceRecord> for DeviceView {
    fn from(d: DeviceRecord) -> Self {
        Self { id: d.id, name: d.name, api_key_id: d.api_key_id, status: d.status, active_event_id: d.active_event_id, last_seen_at: d.last_seen_at, created_at: d.created_at }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionTokenView {
    pub id: Uuid,
    pub prefix: String,
    /// Present until acknowledged or redeemed.
    pub code: Option<String>,
    #[schema(value_type = String, example = "ACTIVE")]
    pub status: ProvisionStatus,
    pub expires_at: DateTime<Utc>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub used_by_device_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ProvisionRecord> for ProvisionTokenView {
    fn from(p: ProvisionRecord) -> Self {
        Self {
            id: p.id,
            prefix: p.prefix,
            code: p.plaintext,
            status: p.status,
            expires_at: p.expires_at,
            device_id: p.device_id,
            device_name: p.device_name,
            used_by_device_id: p.used_by_device_id,
            used_at: p.used_at,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub name: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedKeyOutput {
    pub key: ApiKeyView,
    /// Shown once; only a keyed hash is stored.
    pub api_key: String,
    pub device: Option<DeviceView>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEventRequest {
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokenOutput {
    pub id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// `{"tenant":slug,"code":code}` for rendering as a QR code.
    pub qr_payload: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Deleted {
    pub deleted: bool,
}

#[utoipa::path(get, path = "/api/admin/me", tag = "admin",
    responses((status = 200, description = "Signed-in user and tenant", body = MeOutput), (status = 401, description = "No valid session")))]
pub async fn me(State(state): State<ServerState>, AdminContext(admin): AdminContext, headers: HeaderMap) -> ApiResult<MeOutput> {
    let token = read_session_cookie(&headers, &state.http.cookie_candidates).ok_or_else(ApiError::unauthenticated)?;
    let current = state.auth.resolve_current_user(&token).await.ok_or_else(ApiError::unauthenticated)?;
    if current.user.id != admin.user_id {
        return Err(ApiError::unauthenticated());
    }
    Ok(ok(MeOutput {
        id: current.user.id,
        email: current.user.email,
        role: current.user.role.as_str().to_string(),
        tenant_id: current.tenant.id,
        tenant_slug: current.tenant.slug,
        tenant_name: current.tenant.name,
    }))
}

#[utoipa::path(get, path = "/api/admin/mobile/keys", tag = "admin", responses((status = 200, description = "Keys of this tenant", body = [ApiKeyView])))]
pub async fn list_keys(State(state): State<ServerState>, AdminContext(admin): AdminContext) -> ApiResult<Vec<ApiKeyView>> {
    let keys = state.mobile.list_api_keys(admin.tenant_id).await?;
    Ok(ok(keys.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/admin/mobile/keys", tag = "admin", request_body = CreateKeyRequest,
    responses((status = 201, description = "Key created; plaintext returned once", body = CreatedKeyOutput), (status = 400, description = "Validation failed")))]
pub async fn create_key(
    State(state): State<ServerState>,
    AdminContext(admin): AdminContext,
    ApiJson(req): ApiJson<CreateKeyRequest>,
) -> ApiResult<CreatedKeyOutput> {
    let created = state.mobile.create_api_key(admin.tenant_id, &req.name, req.device_name.as_deref()).await?;
    Ok(ApiOk(
        StatusCode::CREATED,
        CreatedKeyOutput { key: created.key.into(), api_key: created.plaintext_key, device: created.device.map(Into::into) },
    ))
}

#[utoipa::path(post, path = "/api/admin/mobile/keys/{id}/revoke", tag = "admin", params(("id" = Uuid, Path,)),
    responses((status = 200, description = "Key revoked", body = ApiKeyView), (status = 404, description = "Not found")))]
pub async fn revoke_key(State(state): State<ServerState>, AdminContext(admin): AdminContext, ResourceId(id): ResourceId) -> ApiResult<ApiKeyView> {
    Ok(ok(state.mobile.revoke_api_key(admin.tenant_id, id).await?.into()))
}

#[utoipa::path(delete, path = "/api/admin/mobile/keys/{id}", tag = "admin", params(("id" = Uuid, Path,)),
    responses((status = 200, description = "Key deleted", body = Deleted), (status = 404, description = "Not found")))]
pub async fn delete_key(State(state): State<ServerState>, AdminContext(admin): AdminContext, ResourceId(id): ResourceId) -> ApiResult<Deleted> {
    state.mobile.delete_api_key(admin.tenant_id, id).await?;
    Ok(ok(Deleted { deleted: true }))
}

#[utoipa::path(get, path = "/api/admin/mobile/devices", tag = "admin", responses((status = 200, description = "Devices of this tenant", body = [DeviceView])))]
pub async fn list_devices(State(state): State<ServerState>, AdminContext(admin): AdminContext) -> ApiResult<Vec<DeviceView>> {
    let devices = state.mobile.list_devices(admin.tenant_id).await?;
    Ok(ok(devices.into_iter().map(Into::into).collect()))
}

#[utoipa::path(get, path = "/api/admin/mobile/devices/{id}", tag = "admin", params(("id" = Uuid, Path,)),
    responses((status = 200, description = "Device", body = DeviceView), (status = 404, description = "Not found")))]
pub async fn get_device(State(state): State<ServerState>, AdminContext(admin): AdminContext, ResourceId(id): ResourceId) -> ApiResult<DeviceView> {
    Ok(ok(state.mobile.get_device(admin.tenant_id, id).await?.into()))
}

#[utoipa::path(put, path = "/api/admin/mobile/devices/{id}/active-event", tag = "admin", params(("id" = Uuid, Path,)), request_body = ActiveEventRequest,
    responses((status = 200, description = "Device updated", body = DeviceView), (status = 404, description = "Not found")))]
pub async fn set_active_event(
    State(state): State<ServerState>,
    AdminContext(admin): AdminContext,
    ResourceId(id): ResourceId,
    ApiJson(req): ApiJson<ActiveEventRequest>,
) -> ApiResult<DeviceView> {
    Ok(ok(state.mobile.set_active_event(admin.tenant_id, id, req.event_id).await?.into()))
}

#[utoipa::path(post, path = "/api/admin/mobile/provision-tokens", tag = "admin", request_body = IssueTokenRequest,
    responses((status = 201, description = "Provisioning code issued", body = IssuedTokenOutput), (status = 400, description = "Validation failed"), (status = 404, description = "Unknown device")))]
pub async fn issue_provision_token(
    State(state): State<ServerState>,
    AdminContext(admin): AdminContext,
    ApiJson(req): ApiJson<IssueTokenRequest>,
) -> ApiResult<IssuedTokenOutput> {
    let issued = state.mobile.issue_provision_token(admin.tenant_id, req.device_id, req.device_name, req.ttl_secs).await?;
    Ok(ApiOk(
        StatusCode::CREATED,
        IssuedTokenOutput { id: issued.token.id, code: issued.code, expires_at: issued.token.expires_at, qr_payload: issued.qr_payload },
    ))
}

#[utoipa::path(get, path = "/api/admin/mobile/provision-tokens", tag = "admin", responses((status = 200, description = "Provisioning codes of this tenant", body = [ProvisionTokenView])))]
pub async fn list_provision_tokens(State(state): State<ServerState>, AdminContext(admin): AdminContext) -> ApiResult<Vec<ProvisionTokenView>> {
    let tokens = state.mobile.list_provision_tokens(admin.tenant_id).await?;
    Ok(ok(tokens.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/admin/mobile/provision-tokens/{id}/acknowledge", tag = "admin", params(("id" = Uuid, Path,)),
    responses((status = 200, description = "Plaintext code cleared", body = ProvisionTokenView), (status = 404, description = "Not found")))]
pub async fn acknowledge_provision_token(State(state): State<ServerState>, AdminContext(admin): AdminContext, ResourceId(id): ResourceId) -> ApiResult<ProvisionTokenView> {
    Ok(ok(state.mobile.acknowledge_provision_token(admin.tenant_id, id).await?.into()))
}

#[utoipa::path(post, path = "/api/admin/mobile/provision-tokens/{id}/revoke", tag = "admin", params(("id" = Uuid, Path,)),
    responses((status = 200, description = "Code revoked", body = ProvisionTokenView), (status = 404, description = "Not found")))]
pub async fn revoke_provision_token(State(state): State<ServerState>, AdminContext(admin): AdminContext, ResourceId(id): ResourceId) -> ApiResult<ProvisionTokenView> {
    Ok(ok(state.mobile.revoke_provision_token(admin.tenant_id, id).await?.into()))
}
