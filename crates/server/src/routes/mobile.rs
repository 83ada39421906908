//! Device-facing endpoints. Redemption is public (the code is the
//! credential); everything else arrives with a verified `x-api-key`.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{ok, ApiError, ApiJson, ApiResult};
use crate::guard::DeviceContext;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::state::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/provision/redeem", post(redeem))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub tenant_slug: String,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOutput {
    /// Returned exactly once.
    pub api_key: String,
    pub api_key_id: Uuid,
    pub device_id: Uuid,
    pub tenant_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMe {
    pub device_id: Uuid,
    pub api_key_id: Uuid,
    pub tenant_id: Uuid,
    pub tenant_slug: String,
    pub active_event_id: Option<Uuid>,
}

#[utoipa::path(post, path = "/api/mobile/provision/redeem", tag = "mobile", request_body = RedeemRequest,
    responses((status = 200, description = "New API key for the device", body = RedeemOutput), (status = 400, description = "Invalid code"), (status = 429, description = "Too many attempts")))]
pub async fn redeem(State(state): State<ServerState>, ApiJson(req): ApiJson<RedeemRequest>) -> ApiResult<RedeemOutput> {
    let slug = req.tenant_slug.trim().to_ascii_lowercase();
    let decision = state.rate_check(&format!("redeem:{slug}"), state.http.rate_limit.redeem_per_minute).await;
    if !decision.allowed {
        RATE_LIMITED_TOTAL.inc();
        return Err(ApiError::rate_limited(decision.retry_after_secs));
    }
    let redeemed = state.mobile.redeem_provision_token(&slug, &req.code).await?;
    info!(device_id = %redeemed.device_id, api_key_id = %redeemed.api_key_id, "device_provisioned");
    Ok(ok(RedeemOutput {
        api_key: redeemed.api_key,
        api_key_id: redeemed.api_key_id,
        device_id: redeemed.device_id,
        tenant_id: redeemed.tenant_id,
    }))
}

#[utoipa::path(get, path = "/api/mobile/me", tag = "mobile", params(("x-api-key" = String, Header, description = "Device API key")),
    responses((status = 200, description = "Calling device", body = DeviceMe), (status = 401, description = "Missing, unknown or revoked key"), (status = 429, description = "Rate limited")))]
pub async fn me(DeviceContext(device): DeviceContext) -> ApiResult<DeviceMe> {
    Ok(ok(DeviceMe {
        device_id: device.device_id,
        api_key_id: device.api_key_id,
        tenant_id: device.tenant_id,
        tenant_slug: device.tenant_slug,
        active_event_id: device.active_event_id,
    }))
}
