use http::{Request, Response};

/// Failures below the HTTP status level. Status codes are interpreted by the callers.
#[derive(thiserror::Error, Debug)]
pub enum HttpClientError {
    /// No response was received at all.
    #[error("http transport error: `{0}`")]
    TransportError(String),
    #[error("invalid http response: `{0}`")]
    InvalidResponse(String),
}

/// Blocking transport used to reach both Azure AD and the Partner Center API.
///
/// Timeouts, proxies and TLS are a concern of the implementation, see [`crate::http::client`].
pub trait HttpClient {
    /// Sends `req` as is and returns whatever status the server answered with.
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
}

// Closures are transports too, handy to stub a single exchange.
impl<F> HttpClient for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>,
{
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        self(req)
    }
}

#[cfg(test)]
pub(crate) mod tests {

    use super::*;

    use mockall::mock;

    mock! {
        pub HttpClient {}

        impl HttpClient for HttpClient {
            fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
        }
    }

    /// Builds a response with a JSON body, as returned by both Azure AD and Partner Center.
    pub(crate) fn json_response(status: u16, body: &str) -> Response<Vec<u8>> {
        Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    #[test]
    fn closures_are_http_clients() {
        let client = |req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            assert_eq!(req.uri(), "https://api.partnercenter.microsoft.com/v1/customers");
            Ok(json_response(200, "{}"))
        };

        let request = Request::get("https://api.partnercenter.microsoft.com/v1/customers")
            .body(Vec::new())
            .unwrap();

        let response = client.send(request).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), b"{}");
    }
}
