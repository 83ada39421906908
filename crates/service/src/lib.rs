//! Service layer: the framework-independent auth core.
//! - `token`: signed, purpose-bound, expiring tokens.
//! - `auth`: signup, login, session resolution, password reset.
//! - `mobile`: API keys, devices and the provisioning exchange.
//! - `ratelimit`: swappable best-effort request counters.

pub mod token;
pub mod auth;
pub mod mobile;
pub mod ratelimit;
#[cfg(test)]
pub mod test_support;
