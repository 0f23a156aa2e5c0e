use std::fmt;
use std::sync::Arc;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use url::form_urlencoded;

use crate::config::{PARTNER_CENTER_RESOURCE, ServiceProviderConfig};
use crate::grant::{AccessGrant, TokenResponse};
use crate::http_client::HttpClient;

/// Extra form parameters appended to the token or authorize request.
pub type AdditionalParameters = [(String, String)];

#[derive(Error, Debug)]
pub enum AuthExchangeError {
    #[error("unable to build token request: `{0}`")]
    RequestError(String),
    #[error("identity provider error: Status code: `{0}`, Reason: `{1}`")]
    HttpResponseError(u16, String),
    #[error("http transport error: `{0}`")]
    HttpTransportError(String),
    #[error("unable to deserialize token response: `{0}`")]
    DeserializeError(String),
    #[error("invalid access grant: `{0}`")]
    InvalidGrant(String),
}

/// OAuth2 operations against the identity provider.
///
/// Every exchange is a single blocking round-trip. Nothing is retried here.
pub trait AuthOperations {
    /// URL the user agent is sent to in order to obtain an authorization code.
    fn build_authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<Url, AuthExchangeError>;

    /// Trades an authorization code for an access grant.
    fn exchange_for_access(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError>;

    /// Trades the application credentials themselves for an app-only access grant.
    fn exchange_credentials_for_access(
        &self,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError>;

    fn refresh_access(
        &self,
        refresh_token: &str,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

/// OAuth2 error body returned by Azure AD.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Auth operations bound to the tenant scoped Azure AD endpoints.
pub struct AzureAdAuthOperations<C: HttpClient> {
    config: Arc<ServiceProviderConfig>,
    http_client: Arc<C>,
}

impl<C: HttpClient> fmt::Debug for AzureAdAuthOperations<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAdAuthOperations")
            .field("config", &self.config)
            .field("http_client", &"impl HttpClient") // HttpClient does not implement Debug
            .finish()
    }
}

impl<C: HttpClient> AzureAdAuthOperations<C> {
    pub fn new(config: Arc<ServiceProviderConfig>, http_client: Arc<C>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn exchange(
        &self,
        grant_type: GrantType,
        parameters: Vec<(&str, &str)>,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError> {
        let request = self.build_token_request(grant_type, parameters, additional_parameters)?;

        debug!(
            grant_type = grant_type.as_str(),
            tenant = self.config.tenant(),
            "exchanging for access grant"
        );

        let response = self.http_client.send(request).map_err(|e| {
            warn!(grant_type = grant_type.as_str(), "token request failed: {e}");
            AuthExchangeError::HttpTransportError(e.to_string())
        })?;

        evaluate_response(response)
    }

    fn build_token_request(
        &self,
        grant_type: GrantType,
        parameters: Vec<(&str, &str)>,
        additional_parameters: &AdditionalParameters,
    ) -> Result<Request<Vec<u8>>, AuthExchangeError> {
        let uri = self
            .config
            .token_endpoint()
            .map_err(|e| AuthExchangeError::RequestError(e.to_string()))?;

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", grant_type.as_str())
            .append_pair("client_id", self.config.client_id())
            .append_pair("client_secret", self.config.client_secret().expose())
            .append_pair("resource", PARTNER_CENTER_RESOURCE)
            .extend_pairs(parameters)
            .extend_pairs(
                additional_parameters
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .finish();

        Request::builder()
            .uri(uri.as_str())
            .method("POST")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body.into_bytes())
            .map_err(|e| AuthExchangeError::RequestError(e.to_string()))
    }
}

impl<C: HttpClient> AuthOperations for AzureAdAuthOperations<C> {
    fn build_authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<Url, AuthExchangeError> {
        let mut url = self
            .config
            .authorize_endpoint()
            .map_err(|e| AuthExchangeError::RequestError(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", self.config.client_id())
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("resource", PARTNER_CENTER_RESOURCE);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }

    fn exchange_for_access(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError> {
        self.exchange(
            GrantType::AuthorizationCode,
            vec![("code", authorization_code), ("redirect_uri", redirect_uri)],
            additional_parameters,
        )
    }

    fn exchange_credentials_for_access(
        &self,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError> {
        self.exchange(
            GrantType::ClientCredentials,
            Vec::new(),
            additional_parameters,
        )
    }

    fn refresh_access(
        &self,
        refresh_token: &str,
        additional_parameters: &AdditionalParameters,
    ) -> Result<AccessGrant, AuthExchangeError> {
        self.exchange(
            GrantType::RefreshToken,
            vec![("refresh_token", refresh_token)],
            additional_parameters,
        )
    }
}

fn evaluate_response(res: Response<Vec<u8>>) -> Result<AccessGrant, AuthExchangeError> {
    let body = res.body();

    match res.status() {
        StatusCode::OK => {
            let token_response: TokenResponse = serde_json::from_slice(body)
                .map_err(|e| AuthExchangeError::DeserializeError(e.to_string()))?;
            AccessGrant::try_from(token_response)
        }
        status => {
            let reason = match serde_json::from_slice::<ErrorResponse>(body) {
                Ok(ErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(ErrorResponse { error, .. }) => error,
                Err(_) => String::from_utf8_lossy(body).to_string(),
            };
            warn!(status = status.as_u16(), "identity provider rejected the exchange");
            Err(AuthExchangeError::HttpResponseError(status.as_u16(), reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::http_client::HttpClientError;
    use crate::http_client::tests::{MockHttpClient, json_response};

    const TOKEN_ENDPOINT: &str =
        "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/token";

    fn config() -> Arc<ServiceProviderConfig> {
        Arc::new(
            ServiceProviderConfig::new("client-id", "client secret", "contoso.onmicrosoft.com")
                .unwrap(),
        )
    }

    fn form_of(req: &Request<Vec<u8>>) -> HashMap<String, String> {
        form_urlencoded::parse(req.body()).into_owned().collect()
    }

    fn auth_operations(http_client: MockHttpClient) -> AzureAdAuthOperations<MockHttpClient> {
        AzureAdAuthOperations::new(config(), Arc::new(http_client))
    }

    #[test]
    fn client_credentials_exchange() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                let form = form_of(req);
                req.method() == http::Method::POST
                    && req.uri() == TOKEN_ENDPOINT
                    && req.headers().get(CONTENT_TYPE).unwrap()
                        == "application/x-www-form-urlencoded"
                    && form["grant_type"] == "client_credentials"
                    && form["client_id"] == "client-id"
                    && form["client_secret"] == "client secret"
                    && form["resource"] == PARTNER_CENTER_RESOURCE
            })
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"token_type":"Bearer","expires_in":"3599","access_token":"app-token"}"#,
                ))
            });

        let grant = auth_operations(http_client)
            .exchange_credentials_for_access(&[])
            .unwrap();

        assert_eq!(grant.access_token(), "app-token");
        assert!(grant.expires_at().is_some());
        assert_eq!(grant.id_token(), None);
    }

    #[test]
    fn authorization_code_exchange() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                let form = form_of(req);
                form["grant_type"] == "authorization_code"
                    && form["code"] == "the-code"
                    && form["redirect_uri"] == "https://app.example.com/callback"
                    && form["prompt"] == "consent"
            })
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"user-token","refresh_token":"r1","id_token":"a.b.c","expires_in":3600}"#,
                ))
            });

        let grant = auth_operations(http_client)
            .exchange_for_access(
                "the-code",
                "https://app.example.com/callback",
                &[("prompt".to_string(), "consent".to_string())],
            )
            .unwrap();

        assert_eq!(grant.access_token(), "user-token");
        assert_eq!(grant.refresh_token(), Some("r1"));
        assert_eq!(grant.id_token(), Some("a.b.c"));
    }

    #[test]
    fn refresh_exchange() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                let form = form_of(req);
                form["grant_type"] == "refresh_token" && form["refresh_token"] == "r1"
            })
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"new-token","refresh_token":"r2","expires_in":3600}"#,
                ))
            });

        let grant = auth_operations(http_client)
            .refresh_access("r1", &[])
            .unwrap();

        assert_eq!(grant.access_token(), "new-token");
        assert_eq!(grant.refresh_token(), Some("r2"));
    }

    #[test]
    fn provider_rejection_is_reported() {
        let mut http_client = MockHttpClient::new();
        http_client.expect_send().once().returning(|_| {
            Ok(json_response(
                401,
                r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
            ))
        });

        let error = auth_operations(http_client)
            .exchange_credentials_for_access(&[])
            .unwrap_err();

        assert_matches!(error, AuthExchangeError::HttpResponseError(401, reason) => {
            assert_eq!(reason, "invalid_client: AADSTS7000215: Invalid client secret provided.");
        });
    }

    #[test]
    fn non_oauth_error_body_is_kept() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Ok(json_response(503, "Service Unavailable")));

        let error = auth_operations(http_client)
            .exchange_credentials_for_access(&[])
            .unwrap_err();

        assert_matches!(error, AuthExchangeError::HttpResponseError(503, reason) => {
            assert_eq!(reason, "Service Unavailable");
        });
    }

    #[test]
    fn transport_error_is_propagated() {
        let mut http_client = MockHttpClient::new();
        http_client.expect_send().once().returning(|_| {
            Err(HttpClientError::TransportError(
                "Connection refused".to_string(),
            ))
        });

        let error = auth_operations(http_client)
            .refresh_access("r1", &[])
            .unwrap_err();

        assert_matches!(error, AuthExchangeError::HttpTransportError(msg) => {
            assert!(msg.contains("Connection refused"));
        });
    }

    #[test]
    fn undecodable_token_response() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Ok(json_response(200, r#"{"token_type":"Bearer"}"#)));

        let error = auth_operations(http_client)
            .exchange_credentials_for_access(&[])
            .unwrap_err();

        assert_matches!(error, AuthExchangeError::DeserializeError(_));
    }

    #[test]
    fn authorize_url() {
        let url = auth_operations(MockHttpClient::new())
            .build_authorize_url("https://app.example.com/callback", Some("xyz"))
            .unwrap();

        assert_eq!(url.path(), "/contoso.onmicrosoft.com/oauth2/authorize");
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(query["resource"], PARTNER_CENTER_RESOURCE);
        assert_eq!(query["state"], "xyz");
    }
}
