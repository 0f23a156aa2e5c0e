//! Decoding of compact signed credentials (JWTs) issued by Azure AD.
//!
//! **The signature is never verified.** [`decode`] only reads the claims the issuer asserted in the
//! payload segment. Identity tokens handled here are obtained directly from the token endpoint over
//! TLS, so the transport is what is trusted. Callers that want to base authorization decisions on
//! these claims must verify the token signature against the tenant signing keys on their own.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};
use thiserror::Error;

/// Object identifier of the principal inside the directory. Stable across applications.
pub const OBJECT_ID_CLAIM: &str = "oid";
/// Subject claim. Pairwise per application in Azure AD.
pub const SUBJECT_CLAIM: &str = "sub";
/// Tenant the principal belongs to.
pub const TENANT_ID_CLAIM: &str = "tid";
/// User principal name.
pub const USER_PRINCIPAL_NAME_CLAIM: &str = "upn";

const SEGMENTS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum CredentialError {
    #[error("malformed credential: `{0}`")]
    MalformedCredential(String),
}

/// Claim set read from the payload of a compact signed token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCredential {
    claims: Map<String, Value>,
}

impl DecodedCredential {
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Returns the claim only when it holds a JSON string.
    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(Value::as_str)
    }

    pub fn oid(&self) -> Option<&str> {
        self.string_claim(OBJECT_ID_CLAIM)
    }

    pub fn sub(&self) -> Option<&str> {
        self.string_claim(SUBJECT_CLAIM)
    }

    pub fn tid(&self) -> Option<&str> {
        self.string_claim(TENANT_ID_CLAIM)
    }

    pub fn upn(&self) -> Option<&str> {
        self.string_claim(USER_PRINCIPAL_NAME_CLAIM)
    }

    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }
}

impl TryFrom<&str> for DecodedCredential {
    type Error = CredentialError;

    fn try_from(token: &str) -> Result<Self, Self::Error> {
        decode(token)
    }
}

/// Decodes the claims of a `header.payload.signature` token without verifying its signature.
///
/// Fails with [`CredentialError::MalformedCredential`] when the token does not have exactly three
/// segments, when the payload is not base64url, or when it does not hold a JSON object.
pub fn decode(token: &str) -> Result<DecodedCredential, CredentialError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != SEGMENTS {
        return Err(CredentialError::MalformedCredential(format!(
            "expected {SEGMENTS} segments, found {}",
            segments.len()
        )));
    }

    // Some issuers keep the base64 padding, the URL-safe alphabet is mandatory though.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        CredentialError::MalformedCredential(format!("payload is not valid base64url: {e}"))
    })?;

    let claims: Map<String, Value> = serde_json::from_slice(&bytes).map_err(|e| {
        CredentialError::MalformedCredential(format!("payload is not a claim set: {e}"))
    })?;

    Ok(DecodedCredential { claims })
}
