use thiserror::Error;

use crate::token::TokenError;

/// Business errors for the device registry.
///
/// `Unauthenticated` and `InvalidCode` deliberately carry no detail: callers
/// must not learn which check failed.
#[derive(Debug, Error)]
pub enum MobileError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid code")]
    InvalidCode,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("repository error: {0}")]
    Repository(String),
}

impl From<models::errors::ModelError> for MobileError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Validation(msg) => MobileError::Validation(msg),
            other => MobileError::Repository(other.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for MobileError {
    fn from(e: sea_orm::DbErr) -> Self { MobileError::Repository(e.to_string()) }
}
