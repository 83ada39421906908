//! SeaORM entities for tenants, admin users and the mobile device registry.
//!
//! Every owned entity carries `tenant_id`; queries against them are
//! expected to filter on `(id, tenant_id)` together.

pub mod errors;
pub mod db;
pub mod tenant;
pub mod user;
pub mod user_credentials;
pub mod mobile_api_key;
pub mod mobile_device;
pub mod provision_token;

#[cfg(test)]
mod tests;
