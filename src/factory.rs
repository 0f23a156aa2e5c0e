use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapter::{ApiAdapter, PartnerCenterApiAdapter};
use crate::auth::AuthOperations;
use crate::config::ServiceProviderConfig;
use crate::connection::{Connection, ConnectionData};
use crate::credential;
use crate::grant::AccessGrant;
use crate::http_client::HttpClient;
use crate::service_provider::PartnerCenterServiceProvider;
use crate::{ConnectionError, PROVIDER_ID, ProviderId};

/// Strategy deriving the provider user id from a fresh grant.
pub type IdentityExtractor = Arc<dyn Fn(&AccessGrant) -> Option<String> + Send + Sync>;

/// Default identity strategy: the `oid` claim of the identity token.
///
/// Any failure (no identity token, undecodable token, missing claim) yields `None`.
pub fn extract_object_id(grant: &AccessGrant) -> Option<String> {
    let id_token = grant.id_token()?;
    match credential::decode(id_token) {
        Ok(decoded) => {
            let oid = decoded.oid().map(str::to_string);
            if oid.is_none() {
                debug!("identity token has no object id claim, provider user id unavailable");
            }
            oid
        }
        Err(e) => {
            debug!("provider user id unavailable: {e}");
            None
        }
    }
}

/// Entry point producing [`Connection`]s, either from a fresh grant or from persisted data.
pub struct ConnectionFactory<C: HttpClient, A: ApiAdapter<C>> {
    provider_id: ProviderId,
    service_provider: Arc<PartnerCenterServiceProvider<C>>,
    api_adapter: Arc<A>,
    identity_extractor: IdentityExtractor,
}

impl<C: HttpClient, A: ApiAdapter<C>> fmt::Debug for ConnectionFactory<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("provider_id", &self.provider_id)
            .field("service_provider", &self.service_provider)
            .finish()
    }
}

impl<C: HttpClient> ConnectionFactory<C, PartnerCenterApiAdapter> {
    /// Factory for the Partner Center provider with the default adapter and identity strategy.
    pub fn partner_center(config: ServiceProviderConfig, http_client: C) -> Self {
        Self::new(
            PROVIDER_ID,
            PartnerCenterServiceProvider::new(config, http_client),
            PartnerCenterApiAdapter,
        )
    }
}

impl<C: HttpClient, A: ApiAdapter<C>> ConnectionFactory<C, A> {
    pub fn new(
        provider_id: impl Into<ProviderId>,
        service_provider: PartnerCenterServiceProvider<C>,
        api_adapter: A,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            service_provider: Arc::new(service_provider),
            api_adapter: Arc::new(api_adapter),
            identity_extractor: Arc::new(extract_object_id),
        }
    }

    /// Replaces the strategy deriving the provider user id from a grant.
    pub fn with_identity_extractor<F>(self, extractor: F) -> Self
    where
        F: Fn(&AccessGrant) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            identity_extractor: Arc::new(extractor),
            ..self
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn service_provider(&self) -> &PartnerCenterServiceProvider<C> {
        &self.service_provider
    }

    /// Operations to conduct the OAuth2 flow with Azure AD.
    pub fn auth_operations(&self) -> &impl AuthOperations {
        self.service_provider.auth_operations()
    }

    /// Builds a connection from the grant obtained at the end of the OAuth2 flow.
    ///
    /// Never fails: when no identity can be derived the connection simply has no provider user id.
    pub fn create_connection(&self, grant: &AccessGrant) -> Connection<C, A> {
        self.connection_from_grant(grant, false)
    }

    /// Restores a connection from previously persisted data.
    pub fn create_connection_from_data(
        &self,
        data: ConnectionData,
    ) -> Result<Connection<C, A>, ConnectionError> {
        if data.provider_id != self.provider_id {
            warn!(
                expected = %self.provider_id,
                found = %data.provider_id,
                "refusing to restore connection of another provider"
            );
            return Err(ConnectionError::InvalidPersistedState(format!(
                "provider id `{}` does not match `{}`",
                data.provider_id, self.provider_id
            )));
        }

        Connection::from_data(data, self.service_provider.clone(), self.api_adapter.clone())
            .inspect_err(|e| warn!("refusing to restore connection: {e}"))
    }

    /// Runs the client credentials exchange and builds an app-only connection from its grant.
    ///
    /// The connection is app-only: [`Connection::refresh`] repeats this exchange, also after a
    /// restore from its [`ConnectionData`].
    pub fn create_admin_connection(&self) -> Result<Connection<C, A>, ConnectionError> {
        let grant = self.auth_operations().exchange_credentials_for_access(&[])?;
        Ok(self.connection_from_grant(&grant, true))
    }

    fn connection_from_grant(&self, grant: &AccessGrant, app_only: bool) -> Connection<C, A> {
        let provider_user_id = (self.identity_extractor)(grant);
        Connection::from_grant(
            self.provider_id.clone(),
            provider_user_id,
            grant,
            app_only,
            self.service_provider.clone(),
            self.api_adapter.clone(),
        )
    }
}
