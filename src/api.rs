use std::fmt;
use std::sync::Arc;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::grant::AccessToken;
use crate::http_client::HttpClient;

const REQUEST_ID_HEADER: &str = "MS-RequestId";
const CORRELATION_ID_HEADER: &str = "MS-CorrelationId";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unable to build request: `{0}`")]
    RequestError(String),
    /// The remote service rejected the bound access token.
    #[error("unauthorized: `{0}`")]
    Unauthorized(String),
    #[error("partner center error: Status code: `{0}`, Reason: `{1}`")]
    UnsuccessfulResponse(u16, String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
    #[error("unable to serialize request: `{0}`")]
    SerializeError(String),
    #[error("unable to deserialize response: `{0}`")]
    DeserializeError(String),
}

/// Partner Center API client bound to one access token.
///
/// This is the only surface resource operations build on. The token is never validated up front,
/// a rejected token surfaces as [`ApiError::Unauthorized`] on the call that used it.
pub struct PartnerCenter<C: HttpClient> {
    http_client: Arc<C>,
    base_url: Url,
    access_token: AccessToken,
    correlation_id: Uuid,
}

impl<C: HttpClient> fmt::Debug for PartnerCenter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerCenter")
            .field("base_url", &self.base_url)
            .field("access_token", &"<hidden>")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl<C: HttpClient> PartnerCenter<C> {
    pub fn new(http_client: Arc<C>, base_url: Url, access_token: AccessToken) -> Self {
        Self {
            http_client,
            base_url,
            access_token,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Shared by every request issued through this client.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, None)
    }

    pub fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body =
            serde_json::to_vec(body).map_err(|e| ApiError::SerializeError(e.to_string()))?;
        self.execute(Method::POST, path, Some(body))
    }

    pub fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body =
            serde_json::to_vec(body).map_err(|e| ApiError::SerializeError(e.to_string()))?;
        self.execute(Method::PATCH, path, Some(body))
    }

    fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError> {
        let request = self.build_request(method, path, body)?;
        debug!(method = %request.method(), uri = %request.uri(), "calling partner center");

        let response = self
            .http_client
            .send(request)
            .map_err(|e| ApiError::TransportError(e.to_string()))?;

        evaluate_response(response)
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Request<Vec<u8>>, ApiError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::RequestError(format!("invalid path `{path}`: {e}")))?;
        // The bearer token only ever goes to the configured API.
        if url.origin() != self.base_url.origin() {
            return Err(ApiError::RequestError(format!(
                "`{path}` leaves the partner center api at `{}`",
                self.base_url
            )));
        }

        let builder = Request::builder()
            .uri(url.as_str())
            .method(method)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .header(CORRELATION_ID_HEADER, self.correlation_id.to_string());

        let builder = if body.is_some() {
            builder.header(CONTENT_TYPE, "application/json")
        } else {
            builder
        };

        builder
            .body(body.unwrap_or_default())
            .map_err(|e| ApiError::RequestError(e.to_string()))
    }
}

fn evaluate_response<T: DeserializeOwned>(res: Response<Vec<u8>>) -> Result<T, ApiError> {
    // Partner Center prefixes its JSON payloads with a byte order mark.
    let body = res
        .body()
        .strip_prefix(UTF8_BOM)
        .unwrap_or(res.body().as_slice());

    match res.status() {
        status if status.is_success() => {
            serde_json::from_slice(body).map_err(|e| ApiError::DeserializeError(e.to_string()))
        }
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized(
            String::from_utf8_lossy(body).to_string(),
        )),
        status => Err(ApiError::UnsuccessfulResponse(
            status.as_u16(),
            String::from_utf8_lossy(body).to_string(),
        )),
    }
}
