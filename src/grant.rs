use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::AuthExchangeError;

pub type AccessToken = String;

/// Successful response of the Azure AD token endpoint.
///
/// The v1 endpoint reports `expires_in` as a string, so both representations are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub token_type: Option<String>,
    /// The lifetime in seconds of the access token.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(secs)) => Ok(Some(secs)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Token bundle produced by one successful OAuth2 exchange. Immutable; a refresh yields a new one.
///
/// An absent `expires_at` means the provider did not report a lifetime, so the expiry is unknown.
/// It does not mean the grant never expires.
#[derive(Clone, PartialEq)]
pub struct AccessGrant {
    access_token: AccessToken,
    id_token: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessGrant {
    pub fn new(
        access_token: AccessToken,
        id_token: Option<String>,
        refresh_token: Option<String>,
        scope: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            id_token,
            refresh_token,
            scope,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Builds the grant from a token response, anchoring the relative lifetime at `issued_at`.
    pub(crate) fn from_response_at(
        response: TokenResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, AuthExchangeError> {
        let expires_at = response
            .expires_in
            .map(|secs| {
                let delta = TimeDelta::from_std(Duration::from_secs(secs))
                    .map_err(|e| AuthExchangeError::InvalidGrant(e.to_string()))?;
                issued_at.checked_add_signed(delta).ok_or_else(|| {
                    AuthExchangeError::InvalidGrant("calculating expiration time".to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            access_token: response.access_token,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            scope: response.scope,
            expires_at,
        })
    }
}

impl TryFrom<TokenResponse> for AccessGrant {
    type Error = AuthExchangeError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        Self::from_response_at(response, Utc::now())
    }
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"<hidden>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<hidden>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<hidden>"),
            )
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
