//! Request authentication for the HTTP surface
//!
//! Two schemes, used by different deployment variants and never combined
//! on one request path:
//! - HTTP Basic guards the snapshot read path
//! - HMAC-SHA256 over the raw body (nonce-keyed) guards batch ingestion
//!
//! The HMAC key is `secret + nonce`, so every request carries a fresh
//! sender-chosen nonce. Nonce reuse is not tracked server-side.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Unsupported authorization scheme")]
    WrongScheme,

    #[error("Malformed credentials")]
    MalformedCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Signature mismatch")]
    SignatureMismatch,
}

/// Basic-auth verifier for the snapshot read path.
///
/// With neither username nor password configured, every request passes:
/// those deployments sit behind their own gateway auth.
pub struct BasicAuth {
    user: Option<String>,
    password: Option<String>,
}

impl BasicAuth {
    pub fn new(user: Option<String>, password: Option<String>) -> Self {
        Self { user, password }
    }

    /// True when no credentials are configured at all
    pub fn disabled(&self) -> bool {
        self.user.is_none() && self.password.is_none()
    }

    /// Check an `Authorization` header value against the configured pair.
    pub fn verify(&self, header: Option<&str>) -> Result<(), AuthError> {
        if self.disabled() {
            return Ok(());
        }

        let header = header.ok_or(AuthError::MissingHeader)?;
        let (scheme, encoded) = header
            .split_once(' ')
            .ok_or(AuthError::MalformedCredentials)?;
        if scheme != "Basic" {
            return Err(AuthError::WrongScheme);
        }

        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| AuthError::MalformedCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;
        let (user, password) = decoded
            .split_once(':')
            .ok_or(AuthError::MalformedCredentials)?;

        if self.user.as_deref() != Some(user) || self.password.as_deref() != Some(password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }
}

/// HMAC-SHA256 verifier for the batch ingest path.
///
/// Expects `Authorization: HMAC-SHA256 <signature>:<nonce>` where the
/// signature is `base64(HMAC-SHA256(key = secret + nonce, message = body))`.
pub struct HmacAuth {
    secret: String,
}

impl HmacAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a body with a caller-chosen nonce, the way a gateway does.
    pub fn sign(&self, nonce: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(format!("{}{}", self.secret, nonce).as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Verify an `Authorization` header value against the raw request body.
    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let (scheme, rest) = header
            .split_once(' ')
            .ok_or(AuthError::MalformedCredentials)?;
        if scheme != "HMAC-SHA256" {
            return Err(AuthError::WrongScheme);
        }

        let (signature, nonce) = rest.split_once(':').ok_or(AuthError::MalformedCredentials)?;
        let signature = BASE64
            .decode(signature)
            .map_err(|_| AuthError::MalformedCredentials)?;

        let mut mac = HmacSha256::new_from_slice(format!("{}{}", self.secret, nonce).as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(body);
        // Constant-time comparison
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::SignatureMismatch)
    }
}
