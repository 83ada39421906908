use utoipa::OpenApi;
use utoipa::ToSchema;

use crate::routes::{admin, auth, mobile};

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        auth::register,
        auth::login,
        auth::logout,
        auth::request_password_reset,
        auth::confirm_password_reset,
        admin::me,
        admin::list_keys,
        admin::create_key,
        admin::revoke_key,
        admin::delete_key,
        admin::list_devices,
        admin::get_device,
        admin::set_active_event,
        admin::issue_provision_token,
        admin::list_provision_tokens,
        admin::acknowledge_provision_token,
        admin::revoke_provision_token,
        mobile::redeem,
        mobile::me,
    ),
    components(
        schemas(
            HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::SessionOutput,
            auth::ResetRequest,
            auth::ResetConfirm,
            auth::Done,
            admin::MeOutput,
            admin::ApiKeyView,
            admin::DeviceView,
            admin::ProvisionTokenView,
            admin::CreateKeyRequest,
            admin::CreatedKeyOutput,
            admin::ActiveEventRequest,
            admin::IssueTokenRequest,
            admin::IssuedTokenOutput,
            admin::Deleted,
            mobile::RedeemRequest,
            mobile::RedeemOutput,
            mobile::DeviceMe,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth", description = "Signup, session cookie and password reset"),
        (name = "admin", description = "Tenant-scoped administration, session cookie required"),
        (name = "mobile", description = "Device provisioning and x-api-key endpoints")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_surface() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for p in ["/health", "/auth/login", "/api/admin/me", "/api/admin/mobile/keys", "/api/mobile/provision/redeem", "/api/mobile/me"] {
            assert!(paths.iter().any(|k| k.as_str() == p), "missing {p}");
        }
    }
}
