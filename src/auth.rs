use chrono::{Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::models::UserRole;

/// Claims
///
/// The payload structure carried inside issued JSON Web Tokens. Signed with
/// the process-wide secret and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the numeric id of the user.
    pub sub: i64,
    /// The role at issue time. Tokens are not re-validated against storage,
    /// so a role changed out-of-band keeps reporting the issued role until
    /// the token is reissued.
    pub role: UserRole,
    /// Issued At (iat): timestamp when the token was created.
    pub iat: usize,
    /// Expiration Time (exp): timestamp after which the token is rejected.
    pub exp: usize,
}

/// Identity
///
/// The resolved identity of an authenticated request. Request-scoped: built
/// by token verification, threaded through the pipeline, discarded with the
/// request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity {
    pub subject_id: i64,
    pub role: UserRole,
}

/// TokenError
///
/// Verification failure modes. Both surface to callers as an authentication
/// failure; the distinction exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenError {
    /// Signature mismatch, malformed structure, or encoding failure.
    Invalid,
    /// Structurally valid and correctly signed, but past its expiry.
    Expired,
}

/// TokenCodec
///
/// Issues and verifies signed, time-bound identity tokens. A pure function
/// pair over an immutable secret established at startup; the codec holds no
/// other state and is shared read-only across all requests.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// issue
    ///
    /// Encodes the subject id and role plus an expiration timestamp and signs
    /// the result. No side effects beyond the computation.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.subject_id,
            role: identity.role,
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("token encoding failed: {:?}", e);
            TokenError::Invalid
        })
    }

    /// verify
    ///
    /// Checks signature and expiration and produces the caller's Identity.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    // Bad signature, malformed token, wrong algorithm, etc.
                    _ => TokenError::Invalid,
                }
            })?;

        Ok(Identity {
            subject_id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}
