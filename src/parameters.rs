use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Args, Error, Subcommand, ValueEnum};

use crate::config::{AzureEnvironment, ConfigError, ServiceProviderConfig};
use crate::http::config::{DEFAULT_HTTP_CONN_TIMEOUT, HttpConfig, ProxyConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Creates an app-only connection with the client credentials grant and prints it.
    Connect {
        /// Application registration used to authenticate.
        #[command(flatten)]
        provider_args: ProviderArgs,

        /// Select how the connection should be printed
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output_format: OutputFormat,

        /// Transport options.
        #[command(flatten)]
        http_args: HttpArgs,
    },
    /// Prints the claims of a compact signed token. The signature is NOT verified.
    DecodeCredential {
        /// Token in `header.payload.signature` form
        #[arg(long, required = true)]
        token: String,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Returns only the access token
    #[value(name = "Plain")]
    Plain,
    /// Returns the persistable connection data in json format
    #[value(name = "Json")]
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Application (client) ID registered in Azure AD
    #[arg(long, short, required = true)]
    client_id: String,

    /// Client secret of the application
    #[arg(long, required = true)]
    client_secret: String,

    /// Tenant the application belongs to, e.g. `contoso.onmicrosoft.com`
    #[arg(long, short, required = true)]
    tenant: String,

    /// Custom authority base url. Requires '--api-endpoint'.
    #[arg(long, requires = "api_endpoint")]
    authority: Option<String>,

    /// Custom Partner Center API base url. Requires '--authority'.
    #[arg(long, requires = "authority")]
    api_endpoint: Option<String>,
}

impl ProviderArgs {
    pub fn to_config(&self) -> Result<ServiceProviderConfig, Error> {
        let environment = match (&self.authority, &self.api_endpoint) {
            (Some(authority), Some(api)) => AzureEnvironment::custom(authority, api)?,
            _ => AzureEnvironment::Global,
        };
        let config = ServiceProviderConfig::new(
            self.client_id.as_str(),
            self.client_secret.as_str(),
            self.tenant.as_str(),
        )?;
        Ok(config.with_environment(environment))
    }
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Proxy url: <protocol>://<user>:<password>@<host>:<port>. Defaults to HTTPS_PROXY/HTTP_PROXY.
    #[arg(long)]
    proxy_url: Option<String>,

    /// Directory with the CA certificates of the proxy, in PEM format
    #[arg(long)]
    proxy_ca_bundle_dir: Option<PathBuf>,

    /// File with the CA certificate of the proxy, in PEM format
    #[arg(long)]
    proxy_ca_bundle_file: Option<PathBuf>,
}

impl HttpArgs {
    pub fn to_http_config(&self) -> Result<HttpConfig, Error> {
        let proxy = ProxyConfig::new(
            self.proxy_url.as_deref().unwrap_or_default(),
            self.proxy_ca_bundle_dir.clone().unwrap_or_default(),
            self.proxy_ca_bundle_file.clone().unwrap_or_default(),
        )?
        .try_with_url_from_env()?;

        Ok(HttpConfig::new(
            Duration::from_secs(self.timeout),
            DEFAULT_HTTP_CONN_TIMEOUT.min(Duration::from_secs(self.timeout)),
            proxy,
        ))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::raw(ErrorKind::InvalidValue, err.to_string())
    }
}
