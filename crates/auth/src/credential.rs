//! Signed credentials (HS256 JWT).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use cardkeep_core::CardError;

use crate::claims::{CredentialClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential is malformed: {0}")]
    Malformed(String),

    #[error("credential signature does not verify")]
    BadSignature,

    #[error(transparent)]
    Invalid(#[from] TokenValidationError),

    #[error("failed to sign credential: {0}")]
    Signing(String),
}

impl From<CredentialError> for CardError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Signing(msg) => CardError::Unknown(msg),
            other => CardError::Unauthorized(other.to_string()),
        }
    }
}

/// Turns an opaque credential into trusted claims.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str, now: DateTime<Utc>) -> Result<CredentialClaims, CredentialError>;
}

/// Shared-secret HS256 signer/verifier.
///
/// The simulated backend signs with it; the session store verifies with it.
#[derive(Clone)]
pub struct Hs256Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256Credentials {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &CredentialClaims) -> Result<String, CredentialError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    fn validation() -> Validation {
        // Time checks run against our own `issued_at`/`expires_at` claims.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation
    }
}

impl core::fmt::Debug for Hs256Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Credentials").finish_non_exhaustive()
    }
}

impl CredentialVerifier for Hs256Credentials {
    fn verify(&self, credential: &str, now: DateTime<Utc>) -> Result<CredentialClaims, CredentialError> {
        let data = jsonwebtoken::decode::<CredentialClaims>(credential, &self.decoding, &Self::validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => CredentialError::BadSignature,
                _ => CredentialError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
