use std::fmt;
use std::sync::Arc;

use crate::api::PartnerCenter;
use crate::auth::{AuthOperations, AzureAdAuthOperations};
use crate::config::ServiceProviderConfig;
use crate::http_client::HttpClient;

/// Holds the application registration and hands out the objects built from it.
///
/// Read-only after construction, it can be shared between connections and threads.
pub struct PartnerCenterServiceProvider<C: HttpClient> {
    config: Arc<ServiceProviderConfig>,
    http_client: Arc<C>,
    auth_operations: AzureAdAuthOperations<C>,
}

impl<C: HttpClient> fmt::Debug for PartnerCenterServiceProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerCenterServiceProvider")
            .field("config", &self.config)
            .field("http_client", &"impl HttpClient") // HttpClient does not implement Debug
            .finish()
    }
}

impl<C: HttpClient> PartnerCenterServiceProvider<C> {
    pub fn new(config: ServiceProviderConfig, http_client: C) -> Self {
        let config = Arc::new(config);
        let http_client = Arc::new(http_client);
        let auth_operations = AzureAdAuthOperations::new(config.clone(), http_client.clone());
        Self {
            config,
            http_client,
            auth_operations,
        }
    }

    pub fn config(&self) -> &ServiceProviderConfig {
        &self.config
    }

    /// Operations conducting the OAuth2 flow against the tenant.
    pub fn auth_operations(&self) -> &impl AuthOperations {
        &self.auth_operations
    }

    /// A new API client bound to `access_token`.
    pub fn api(&self, access_token: &str) -> PartnerCenter<C> {
        PartnerCenter::new(
            self.http_client.clone(),
            self.config.environment().api_base_url(),
            access_token.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureEnvironment;
    use crate::http_client::tests::MockHttpClient;

    #[test]
    fn api_is_bound_to_token_and_environment() {
        let config = ServiceProviderConfig::new("id", "secret", "contoso.onmicrosoft.com")
            .unwrap()
            .with_environment(
                AzureEnvironment::custom("https://login.example.com", "https://pc.example.com")
                    .unwrap(),
            );
        let provider = PartnerCenterServiceProvider::new(config, MockHttpClient::new());

        let api = provider.api("token-1");

        assert_eq!(api.access_token(), "token-1");
        assert_eq!(api.base_url().as_str(), "https://pc.example.com/");
    }

    #[test]
    fn auth_operations_target_the_configured_tenant() {
        let config = ServiceProviderConfig::new("id", "secret", "contoso.onmicrosoft.com").unwrap();
        let provider = PartnerCenterServiceProvider::new(config, MockHttpClient::new());

        let url = provider
            .auth_operations()
            .build_authorize_url("https://app.example.com/cb", None)
            .unwrap();

        assert!(url.as_str().starts_with(
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/authorize?"
        ));
    }
}
