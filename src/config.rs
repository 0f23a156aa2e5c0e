use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// Known endpoints of the public Azure cloud.
const GLOBAL_AUTHORITY_STR: &str = "https://login.microsoftonline.com/";
const GLOBAL_API_STR: &str = "https://api.partnercenter.microsoft.com/";

/// Resource requested in every token exchange so the grant is valid for the Partner Center API.
pub const PARTNER_CENTER_RESOURCE: &str = "https://api.partnercenter.microsoft.com";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required value: `{0}`")]
    MissingValue(&'static str),
    #[error("invalid url `{0}`: `{1}`")]
    InvalidUrl(String, String),
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret(String);

impl<S: AsRef<str>> From<S> for ClientSecret {
    fn from(secret: S) -> Self {
        ClientSecret(secret.as_ref().to_string())
    }
}

impl ClientSecret {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientSecret: redacted")
    }
}

/// Azure cloud the application is registered in.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AzureEnvironment {
    #[default]
    Global,
    Custom {
        /// Base of the authority, the tenant is appended to it.
        authority: Url,
        api: Url,
    },
}

impl AzureEnvironment {
    pub fn custom(authority: &str, api: &str) -> Result<Self, ConfigError> {
        Ok(Self::Custom {
            authority: parse_base_url(authority)?,
            api: parse_base_url(api)?,
        })
    }

    pub fn authority(&self) -> Url {
        match self {
            Self::Global => Url::parse(GLOBAL_AUTHORITY_STR)
                .expect("Failed to parse known URL: GLOBAL_AUTHORITY"),
            Self::Custom { authority, .. } => authority.to_owned(),
        }
    }

    /// Base URL every Partner Center API path is resolved against.
    pub fn api_base_url(&self) -> Url {
        match self {
            Self::Global => {
                Url::parse(GLOBAL_API_STR).expect("Failed to parse known URL: GLOBAL_API")
            }
            Self::Custom { api, .. } => api.to_owned(),
        }
    }

    pub fn token_endpoint(&self, tenant: &str) -> Result<Url, ConfigError> {
        self.tenant_endpoint(tenant, "oauth2/token")
    }

    pub fn authorize_endpoint(&self, tenant: &str) -> Result<Url, ConfigError> {
        self.tenant_endpoint(tenant, "oauth2/authorize")
    }

    fn tenant_endpoint(&self, tenant: &str, path: &str) -> Result<Url, ConfigError> {
        let raw = format!("{tenant}/{path}");
        self.authority()
            .join(&raw)
            .map_err(|e| ConfigError::InvalidUrl(raw, e.to_string()))
    }
}

// `Url::join` drops the last path segment unless the base ends with a slash.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl(value.to_string(), e.to_string()))
}

/// Application registration used against Azure AD. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceProviderConfig {
    client_id: String,
    client_secret: ClientSecret,
    tenant: String,
    environment: AzureEnvironment,
}

impl ServiceProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<ClientSecret>,
        tenant: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        let tenant = tenant.into();
        if client_id.trim().is_empty() {
            return Err(ConfigError::MissingValue("client_id"));
        }
        if tenant.trim().is_empty() {
            return Err(ConfigError::MissingValue("tenant"));
        }
        Ok(Self {
            client_id,
            client_secret: client_secret.into(),
            tenant,
            environment: AzureEnvironment::default(),
        })
    }

    pub fn with_environment(self, environment: AzureEnvironment) -> Self {
        Self {
            environment,
            ..self
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn environment(&self) -> &AzureEnvironment {
        &self.environment
    }

    pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
        self.environment.token_endpoint(&self.tenant)
    }

    pub fn authorize_endpoint(&self) -> Result<Url, ConfigError> {
        self.environment.authorize_endpoint(&self.tenant)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        AzureEnvironment::Global,
        "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/token",
        "https://api.partnercenter.microsoft.com/"
    )]
    #[case(
        AzureEnvironment::custom("https://login.example.com/base", "https://api.example.com").unwrap(),
        "https://login.example.com/base/contoso.onmicrosoft.com/oauth2/token",
        "https://api.example.com/"
    )]
    fn endpoints(
        #[case] env: AzureEnvironment,
        #[case] expected_token_endpoint: &str,
        #[case] expected_api: &str,
    ) {
        assert_eq!(
            env.token_endpoint("contoso.onmicrosoft.com").unwrap().as_str(),
            expected_token_endpoint
        );
        assert_eq!(env.api_base_url().as_str(), expected_api);
    }

    #[test]
    fn authorize_endpoint_is_tenant_scoped() {
        let config = ServiceProviderConfig::new("id", "secret", "contoso.onmicrosoft.com").unwrap();
        assert_eq!(
            config.authorize_endpoint().unwrap().as_str(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/authorize"
        );
    }

    #[rstest]
    #[case("", "tenant", "client_id")]
    #[case("  ", "tenant", "client_id")]
    #[case("client", "", "tenant")]
    fn missing_values(#[case] client_id: &str, #[case] tenant: &str, #[case] missing: &str) {
        assert_matches!(
            ServiceProviderConfig::new(client_id, "secret", tenant),
            Err(ConfigError::MissingValue(name)) => assert_eq!(name, missing)
        );
    }

    #[test]
    fn invalid_custom_environment() {
        assert_matches!(
            AzureEnvironment::custom("not a url", "https://api.example.com"),
            Err(ConfigError::InvalidUrl(url, _)) => assert_eq!(url, "not a url")
        );
    }

    #[test]
    fn secret_is_redacted() {
        let config = ServiceProviderConfig::new("id", "super-secret", "tenant").unwrap();
        let output = format!("{config:?}");
        assert!(!output.contains("super-secret"));
        assert!(output.contains("redacted"));
    }
}
