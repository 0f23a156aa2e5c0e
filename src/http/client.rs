use std::fs;
use std::path::Path;

use http::{Request, Response};
use reqwest::blocking::Client;
use reqwest::{Certificate, Proxy};
use tracing::debug;

use super::config::{HttpConfig, ProxyConfig};
use crate::http_client::{HttpClient as PartnerCenterHttpClient, HttpClientError};

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
    #[error("could not load certificates from `{0}`: {1}")]
    CertificateBundle(String, String),
}

/// Blocking reqwest client reaching Azure AD and Partner Center.
///
/// Cheap to clone, clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_native_certs(true)
            .timeout(config.timeout)
            .connect_timeout(config.conn_timeout);

        let builder = match config.proxy.url() {
            None => builder,
            Some(url) => {
                debug!(proxy_host = ?url.host_str(), "using proxy");
                let proxy = Proxy::all(url.as_str())
                    .map_err(|err| HttpBuildError::InvalidProxy(err.to_string()))?;
                certificates(&config.proxy)?
                    .into_iter()
                    .fold(builder.proxy(proxy), |builder, cert| {
                        builder.add_root_certificate(cert)
                    })
            }
        };

        builder
            .build()
            .map(|inner| Self { inner })
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))
    }
}

impl PartnerCenterHttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        let (parts, body) = req.into_parts();

        let res = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .map_err(|err| HttpClientError::TransportError(err.to_string()))?;

        let mut builder = Response::builder().status(res.status()).version(res.version());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(res.headers().clone());
        }

        let body = res
            .bytes()
            .map_err(|err| HttpClientError::InvalidResponse(err.to_string()))?;

        builder
            .body(body.to_vec())
            .map_err(|err| HttpClientError::InvalidResponse(err.to_string()))
    }
}

/// Certificates from the configured CA bundle file and every `.pem` file of the bundle dir.
fn certificates(proxy: &ProxyConfig) -> Result<Vec<Certificate>, HttpBuildError> {
    let mut certificates = Vec::new();

    let file = proxy.ca_bundle_file();
    if !file.as_os_str().is_empty() {
        certificates.extend(read_certificates(file)?);
    }

    let dir = proxy.ca_bundle_dir();
    if !dir.as_os_str().is_empty() {
        for entry in fs::read_dir(dir).map_err(|err| bundle_error(dir, err))? {
            let path = entry.map_err(|err| bundle_error(dir, err))?.path();
            if path.extension().is_some_and(|ext| ext == "pem") {
                certificates.extend(read_certificates(&path)?);
            }
        }
    }

    Ok(certificates)
}

fn read_certificates(path: &Path) -> Result<Vec<Certificate>, HttpBuildError> {
    let pem = fs::read(path).map_err(|err| bundle_error(path, err))?;
    Certificate::from_pem_bundle(&pem).map_err(|err| bundle_error(path, err))
}

fn bundle_error(path: &Path, err: impl ToString) -> HttpBuildError {
    HttpBuildError::CertificateBundle(path.display().to_string(), err.to_string())
}
