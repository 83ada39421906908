//! Mobile API key / device registry and the provisioning exchange.
//!
//! Same layering as `auth`: plain domain records, a repository trait with an
//! in-memory mock and a SeaORM implementation, and a service that owns the
//! key material and hashing.

pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;
pub mod repo;

pub use service::MobileService;
