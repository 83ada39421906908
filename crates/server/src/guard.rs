//! Tenant-scoping extractors.
//!
//! Handlers that touch tenant-owned rows take a [`TenantContext`] (or one of
//! the narrower [`AdminContext`] / [`DeviceContext`]) instead of reading
//! headers. Every failure here renders the same 404 as a missing row.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use tracing::debug;
use uuid::Uuid;

use service::mobile::domain::MobileIdentity;

use crate::errors::ApiError;
use crate::gate::{AdminIdentity, Identity, H_TENANT_ID, H_TENANT_SLUG};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub tenant_slug: String,
}

/// Cross-check an explicit tenant claim against the verified identity.
/// Any disagreement, or an unparseable claim, collapses into not-found.
pub fn require_tenant_context(parts: &Parts) -> Result<TenantContext, ApiError> {
    let identity = parts.extensions.get::<Identity>().ok_or_else(ApiError::not_found)?;
    let ctx = TenantContext { tenant_id: identity.tenant_id(), tenant_slug: identity.tenant_slug().to_string() };

    if let Some(claim) = parts.headers.get(H_TENANT_ID) {
        let matches = claim.to_str().ok().and_then(|s| Uuid::parse_str(s).ok()) == Some(ctx.tenant_id);
        if !matches {
            debug!(tenant_id = %ctx.tenant_id, "tenant id claim mismatch");
            return Err(ApiError::not_found());
        }
    }
    if let Some(claim) = parts.headers.get(H_TENANT_SLUG) {
        if claim.to_str().ok() != Some(ctx.tenant_slug.as_str()) {
            debug!(tenant_id = %ctx.tenant_id, "tenant slug claim mismatch");
            return Err(ApiError::not_found());
        }
    }
    Ok(ctx)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_tenant_context(parts)
    }
}

/// A signed-in admin, tenant already cross-checked.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AdminIdentity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_tenant_context(parts)?;
        match parts.extensions.get::<Identity>() {
            Some(Identity::Admin(a)) => Ok(AdminContext(a.clone())),
            _ => Err(ApiError::not_found()),
        }
    }
}

/// A device authenticated by API key.
#[derive(Debug, Clone)]
pub struct DeviceContext(pub MobileIdentity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DeviceContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_tenant_context(parts)?;
        match parts.extensions.get::<Identity>() {
            Some(Identity::Device(d)) => Ok(DeviceContext(d.clone())),
            _ => Err(ApiError::not_found()),
        }
    }
}

/// Path `:id` that is either a UUID or not-found. A malformed id gets the
/// same response as an id owned by someone else.
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ResourceId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await.map_err(|_| ApiError::not_found())?;
        Ok(ResourceId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn parts_with(identity: Option<Identity>, headers: &[(&'static str, &str)]) -> Parts {
        let mut b = Request::builder().uri("/api/admin/x");
        for (k, v) in headers {
            b = b.header(*k, HeaderValue::from_str(v).unwrap());
        }
        let (mut parts, _) = b.body(()).unwrap().into_parts();
        if let Some(i) = identity {
            parts.extensions.insert(i);
        }
        parts
    }

    fn admin(tenant_id: Uuid) -> Identity {
        Identity::Admin(AdminIdentity { user_id: Uuid::new_v4(), tenant_id, tenant_slug: "acme".into(), role: "OWNER".into() })
    }

    #[test]
    fn derives_context_from_identity() {
        let tid = Uuid::new_v4();
        let ctx = require_tenant_context(&parts_with(Some(admin(tid)), &[])).unwrap();
        assert_eq!(ctx, TenantContext { tenant_id: tid, tenant_slug: "acme".into() });
    }

    #[test]
    fn matching_claim_is_accepted() {
        let tid = Uuid::new_v4();
        let p = parts_with(Some(admin(tid)), &[("x-tenant-id", &tid.to_string()), ("x-tenant-slug", "acme")]);
        assert!(require_tenant_context(&p).is_ok());
    }

    #[test]
    fn mismatched_claims_look_like_missing_rows() {
        let tid = Uuid::new_v4();
        let other = Uuid::new_v4().to_string();
        for headers in [
            vec![("x-tenant-id", other.as_str())],
            vec![("x-tenant-id", "not-a-uuid")],
            vec![("x-tenant-slug", "globex")],
        ] {
            let err = require_tenant_context(&parts_with(Some(admin(tid)), &headers)).unwrap_err();
            assert_eq!(err.code, ApiError::not_found().code);
            assert_eq!(err.message, ApiError::not_found().message);
        }
    }

    #[test]
    fn missing_identity_is_not_found() {
        let err = require_tenant_context(&parts_with(None, &[])).unwrap_err();
        assert_eq!(err.code, ApiError::not_found().code);
    }
}
