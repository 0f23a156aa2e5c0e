use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{ApiAdapter, ConnectionValues, UserProfile};
use crate::api::PartnerCenter;
use crate::auth::AuthOperations;
use crate::grant::{AccessGrant, AccessToken};
use crate::http_client::HttpClient;
use crate::service_provider::PartnerCenterServiceProvider;
use crate::{ConnectionError, ProviderId};

/// Identifies a connection: the provider and, when known, the principal inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub provider_id: ProviderId,
    pub provider_user_id: Option<String>,
}

/// How a connection came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOrigin {
    /// Built right after an OAuth2 exchange.
    FromGrant,
    /// Restored from [`ConnectionData`].
    FromPersisted,
}

/// Serializable state of a connection, used to restore it without running the OAuth2 flow again.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub provider_id: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
    /// Obtained with the client credentials grant, renewed by exchanging them again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub app_only: bool,
}

impl fmt::Debug for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionData")
            .field("provider_id", &self.provider_id)
            .field("provider_user_id", &self.provider_user_id)
            .field("display_name", &self.display_name)
            .field("access_token", &self.access_token.as_ref().map(|_| "<hidden>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<hidden>"),
            )
            .field("expire_time", &self.expire_time)
            .field("app_only", &self.app_only)
            .finish()
    }
}

/// An authenticated session against Partner Center.
///
/// The provider user id is settled when the connection is built and never changes afterwards,
/// not even on [`Connection::refresh`].
pub struct Connection<C: HttpClient, A: ApiAdapter<C>> {
    key: ConnectionKey,
    origin: ConnectionOrigin,
    values: ConnectionValues,
    access_token: AccessToken,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    app_only: bool,
    api: PartnerCenter<C>,
    service_provider: Arc<PartnerCenterServiceProvider<C>>,
    api_adapter: Arc<A>,
}

impl<C: HttpClient, A: ApiAdapter<C>> fmt::Debug for Connection<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("origin", &self.origin)
            .field("values", &self.values)
            .field("access_token", &"<hidden>")
            .field("expires_at", &self.expires_at)
            .field("app_only", &self.app_only)
            .finish()
    }
}

impl<C: HttpClient, A: ApiAdapter<C>> Connection<C, A> {
    pub(crate) fn from_grant(
        provider_id: ProviderId,
        provider_user_id: Option<String>,
        grant: &AccessGrant,
        app_only: bool,
        service_provider: Arc<PartnerCenterServiceProvider<C>>,
        api_adapter: Arc<A>,
    ) -> Self {
        let api = service_provider.api(grant.access_token());
        Self {
            key: ConnectionKey {
                provider_id,
                provider_user_id,
            },
            origin: ConnectionOrigin::FromGrant,
            values: ConnectionValues::default(),
            access_token: grant.access_token().to_string(),
            refresh_token: grant.refresh_token().map(str::to_string),
            expires_at: grant.expires_at(),
            app_only,
            api,
            service_provider,
            api_adapter,
        }
    }

    pub(crate) fn from_data(
        data: ConnectionData,
        service_provider: Arc<PartnerCenterServiceProvider<C>>,
        api_adapter: Arc<A>,
    ) -> Result<Self, ConnectionError> {
        let access_token = data
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                ConnectionError::InvalidPersistedState("missing access token".to_string())
            })?;

        let api = service_provider.api(&access_token);
        Ok(Self {
            key: ConnectionKey {
                provider_id: data.provider_id,
                provider_user_id: data.provider_user_id,
            },
            origin: ConnectionOrigin::FromPersisted,
            values: ConnectionValues {
                display_name: data.display_name,
                profile_url: data.profile_url,
                image_url: data.image_url,
            },
            access_token,
            refresh_token: data.refresh_token,
            expires_at: data.expire_time,
            app_only: data.app_only,
            api,
            service_provider,
            api_adapter,
        })
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn provider_id(&self) -> &str {
        &self.key.provider_id
    }

    /// Absent when the identity could not be derived from the grant. Callers that need it must look
    /// it up remotely.
    pub fn provider_user_id(&self) -> Option<&str> {
        self.key.provider_user_id.as_deref()
    }

    pub fn origin(&self) -> ConnectionOrigin {
        self.origin
    }

    pub fn display_name(&self) -> Option<&str> {
        self.values.display_name.as_deref()
    }

    pub fn profile_url(&self) -> Option<&str> {
        self.values.profile_url.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.values.image_url.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the connection acts as the application itself rather than a signed-in user.
    pub fn is_app_only(&self) -> bool {
        self.app_only
    }

    /// API client bound to the current access token.
    pub fn api(&self) -> &PartnerCenter<C> {
        &self.api
    }

    /// Whether the access token is known to have expired. An unknown expiry is never expired.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Same as [`Connection::has_expired`] against the given reference instant.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    pub fn create_data(&self) -> ConnectionData {
        ConnectionData {
            provider_id: self.key.provider_id.clone(),
            provider_user_id: self.key.provider_user_id.clone(),
            display_name: self.values.display_name.clone(),
            profile_url: self.values.profile_url.clone(),
            image_url: self.values.image_url.clone(),
            access_token: Some(self.access_token.clone()),
            refresh_token: self.refresh_token.clone(),
            expire_time: self.expires_at,
            app_only: self.app_only,
        }
    }

    /// Obtains a new grant and rebinds the API client to it.
    ///
    /// App-only connections exchange the client credentials again, the others their refresh
    /// token. Nothing refreshes automatically, this is the explicit path callers take on expiry
    /// or after an unauthorized response.
    pub fn refresh(&mut self) -> Result<(), ConnectionError> {
        let auth_operations = self.service_provider.auth_operations();
        let grant = if self.app_only {
            auth_operations.exchange_credentials_for_access(&[])?
        } else {
            let refresh_token = self.refresh_token.as_deref().ok_or_else(|| {
                ConnectionError::RefreshUnavailable(self.key.provider_id.clone())
            })?;
            auth_operations.refresh_access(refresh_token, &[])?
        };

        debug!(
            provider_id = %self.key.provider_id,
            app_only = self.app_only,
            "connection refreshed"
        );

        self.api = self.service_provider.api(grant.access_token());
        self.access_token = grant.access_token().to_string();
        // Azure AD may omit a new refresh token, the previous one stays valid then.
        if let Some(refresh_token) = grant.refresh_token() {
            self.refresh_token = Some(refresh_token.to_string());
        }
        self.expires_at = grant.expires_at();
        Ok(())
    }

    /// Whether the API answers with the current credentials.
    pub fn test(&self) -> bool {
        self.api_adapter.test(&self.api)
    }

    /// Refreshes the presentation values from the remote profile.
    pub fn sync(&mut self) -> Result<(), ConnectionError> {
        let mut values = self.values.clone();
        self.api_adapter
            .set_connection_values(&self.api, &mut values)?;
        self.values = values;
        Ok(())
    }

    pub fn fetch_user_profile(&self) -> Result<UserProfile, ConnectionError> {
        Ok(self.api_adapter.fetch_user_profile(&self.api)?)
    }

    pub fn update_status(&self, message: &str) -> Result<(), ConnectionError> {
        Ok(self.api_adapter.update_status(&self.api, message)?)
    }
}
