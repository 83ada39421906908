//! Admin session manager: three-layer architecture (domain, repository, service).
//!
//! Signup, credential login, session resolution and password reset live here;
//! the HTTP layer only moves cookies and JSON around.

pub mod domain;
pub mod errors;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod repo;

pub use service::AuthService;
