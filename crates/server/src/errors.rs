//! Uniform response envelopes.
//!
//! Failure: `{ ok: false, error: { code, message, details? }, traceId }`.
//! Success: `{ ok: true, data, traceId }`. Both carry `x-trace-id`.

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use service::auth::errors::AuthError;
use service::mobile::errors::MobileError;
use service::token::TokenError;

use crate::trace::{current_trace_id, TRACE_ID_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthenticated,
    Unauthorized,
    NotFound,
    RateLimited,
    InvalidBody,
    Validation,
    Conflict,
    Misconfigured,
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthenticated | ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InvalidBody | ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Misconfigured | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None, retry_after_secs: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthenticated() -> Self { Self::new(ErrorCode::Unauthenticated, "authentication required") }

    pub fn unauthorized() -> Self { Self::new(ErrorCode::Unauthorized, "invalid email or password") }

    /// The one response for "absent", "other tenant's" and "out of scope".
    pub fn not_found() -> Self { Self::new(ErrorCode::NotFound, "not found") }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self { retry_after_secs: Some(retry_after_secs), ..Self::new(ErrorCode::RateLimited, "too many requests") }
    }

    pub fn invalid_body(message: impl Into<String>) -> Self { Self::new(ErrorCode::InvalidBody, message) }

    pub fn validation(message: impl Into<String>) -> Self { Self::new(ErrorCode::Validation, message) }

    pub fn conflict(message: impl Into<String>) -> Self { Self::new(ErrorCode::Conflict, message) }

    /// Logs `detail` server-side; the caller only sees a generic message.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "internal error");
        Self::new(ErrorCode::Internal, "internal error")
    }

    pub fn misconfigured(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "server misconfigured");
        Self::new(ErrorCode::Misconfigured, "server misconfigured")
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<T>,
    trace_id: String,
}

fn with_trace_header(mut res: Response, trace_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(trace_id) {
        res.headers_mut().insert(TRACE_ID_HEADER, v);
    }
    res
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let trace_id = current_trace_id();
        let status = self.code.status();
        if status.is_client_error() && self.code != ErrorCode::NotFound {
            warn!(code = ?self.code, trace_id = %trace_id, "request rejected");
        }
        let body = Envelope {
            ok: false,
            data: None,
            error: Some(ErrorBody { code: self.code, message: &self.message, details: self.details.as_ref() }),
            trace_id: trace_id.clone(),
        };
        let mut res = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        with_trace_header(res, &trace_id)
    }
}

/// Success envelope with an explicit status.
pub struct ApiOk<T>(pub StatusCode, pub T);

pub fn ok<T: Serialize>(data: T) -> ApiOk<T> { ApiOk(StatusCode::OK, data) }

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        let trace_id = current_trace_id();
        let body = Envelope { ok: true, data: Some(self.1), error: None, trace_id: trace_id.clone() };
        with_trace_header((self.0, Json(body)).into_response(), &trace_id)
    }
}

pub type ApiResult<T> = Result<ApiOk<T>, ApiError>;

/// `Json<T>` whose rejection is an `INVALID_BODY` envelope instead of
/// axum's plain-text response.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(ApiJson(v)),
            Err(rejection) => Err(ApiError::invalid_body(rejection.body_text())),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ApiError::validation(msg),
            AuthError::Conflict => ApiError::conflict("tenant slug or email already in use"),
            AuthError::Unauthorized => ApiError::unauthorized(),
            AuthError::InvalidToken => ApiError::validation("invalid or expired token"),
            AuthError::Token(TokenError::Misconfigured(detail)) => ApiError::misconfigured(detail),
            other => ApiError::internal(other),
        }
    }
}

impl From<MobileError> for ApiError {
    fn from(e: MobileError) -> Self {
        match e {
            MobileError::Validation(msg) => ApiError::validation(msg),
            MobileError::NotFound => ApiError::not_found(),
            MobileError::Unauthenticated => ApiError::unauthenticated(),
            MobileError::InvalidCode => ApiError::validation("invalid code"),
            MobileError::Token(TokenError::Misconfigured(detail)) => ApiError::misconfigured(detail),
            other => ApiError::internal(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
