//! Compact signed tokens: `base64url(json) "." base64url(hmac)`.
//!
//! The HMAC input is `purpose || "." || payload_b64`, so a token minted for
//! one [`Purpose`] never verifies under another. Verification never fails
//! loudly: anything wrong with attacker-supplied input (bad shape, bad
//! signature, bad JSON, missing fields, expired) collapses into `None`.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use common::crypto::{b64url_decode, b64url_encode, ct_eq, hmac_sha256, hmac_sha256_hex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use configs::MIN_SECRET_LEN;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret misconfigured: {0}")]
    Misconfigured(String),
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Signing context mixed into every HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Session,
    PasswordReset,
    Provision,
    MobileKey,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Session => "session",
            Purpose::PasswordReset => "password-reset",
            Purpose::Provision => "provision",
            Purpose::MobileKey => "mobile-key",
        }
    }
}

/// Process-wide signing secret. Cloning shares the bytes.
#[derive(Clone)]
pub struct Secret(Arc<[u8]>);

impl Secret {
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(TokenError::Misconfigured("secret is not set".into()));
        }
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::Misconfigured(format!("secret must be at least {MIN_SECRET_LEN} bytes")));
        }
        Ok(Self(Arc::from(bytes)))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// Claims carried by the admin session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uid: Uuid,
    pub tid: Uuid,
    /// Tenant slug, stable for the tenant's lifetime; lets the gate inject
    /// `x-tenant-slug` without a database round-trip.
    pub slug: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a password-reset link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub uid: Uuid,
    /// Fingerprint of the password hash at issue time; a completed reset
    /// changes the hash and so retires every outstanding link.
    pub fp: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug)]
pub struct TokenCodec {
    secret: Secret,
}

impl TokenCodec {
    pub fn new(secret: Secret) -> Self { Self { secret } }

    /// Build a codec straight from configuration bytes.
    pub fn from_secret(bytes: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        Ok(Self::new(Secret::new(bytes)?))
    }

    fn mac(&self, purpose: Purpose, payload_b64: &str) -> [u8; 32] {
        hmac_sha256(&self.secret.0, &[purpose.as_str().as_bytes(), b".", payload_b64.as_bytes()])
    }

    /// Serialize `claims` and sign them for `purpose`.
    ///
    /// # Examples
    /// ```
    /// use service::token::{Purpose, SessionClaims, TokenCodec};
    /// let codec = TokenCodec::from_secret([7u8; 32]).unwrap();
    /// let now = chrono::Utc::now().timestamp();
    /// let claims = SessionClaims { uid: uuid::Uuid::new_v4(), tid: uuid::Uuid::new_v4(), slug: "acme".into(), role: "OWNER".into(), iat: now, exp: now + 60 };
    /// let token = codec.sign(Purpose::Session, &claims).unwrap();
    /// assert_eq!(codec.verify::<SessionClaims>(Purpose::Session, &token), Some(claims));
    /// ```
    pub fn sign<T: Serialize>(&self, purpose: Purpose, claims: &T) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|e| TokenError::Encode(e.to_string()))?;
        let payload = b64url_encode(&json);
        let sig = b64url_encode(&self.mac(purpose, &payload));
        Ok(format!("{payload}.{sig}"))
    }

    pub fn verify<T: DeserializeOwned>(&self, purpose: Purpose, token: &str) -> Option<T> {
        self.verify_at(purpose, token, Utc::now().timestamp())
    }

    /// Like [`verify`](Self::verify) with an explicit clock (unix seconds).
    /// Expiry is strict: `exp <= now` is expired, no skew allowance.
    pub fn verify_at<T: DeserializeOwned>(&self, purpose: Purpose, token: &str, now: i64) -> Option<T> {
        let (payload, sig) = token.split_once('.')?;
        if payload.is_empty() || sig.contains('.') {
            return None;
        }
        let given = b64url_decode(sig)?;
        let expected = self.mac(purpose, payload);
        if !ct_eq(&expected, &given) {
            return None;
        }
        let json = b64url_decode(payload)?;
        let value: serde_json::Value = serde_json::from_slice(&json).ok()?;
        let exp = value.get("exp")?.as_i64()?;
        if exp <= now {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Keyed hex digest for values stored at rest (API keys, provision
    /// codes). Unlike a bare SHA-256 this is useless without the secret.
    pub fn keyed_hash(&self, purpose: Purpose, value: &str) -> String {
        let mut key = Vec::with_capacity(self.secret.0.len() + 16);
        key.extend_from_slice(&self.secret.0);
        key.extend_from_slice(purpose.as_str().as_bytes());
        hmac_sha256_hex(&key, value)
    }
}
