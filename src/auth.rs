//! HTTP basic-auth pipeline stage.
//!
//! Checks the `Authorization` header against a static credentials map before
//! letting the request continue. Anything short of a valid, known
//! username:password pair gets a 401 with a `WWW-Authenticate` challenge and
//! the standard error body.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};

use crate::error::{HttpError, error_response};
use crate::handler::{BoxFuture, ready};
use crate::middleware::{Next, Stage};
use crate::request::Request;

/// The basic-auth stage. Wrap the routes that need protection in their own
/// pipeline; credentials are fixed at startup.
pub struct BasicAuth {
    credentials: HashMap<String, String>,
    realm: String,
}

impl BasicAuth {
    pub fn new(credentials: HashMap<String, String>, realm: impl Into<String>) -> Self {
        Self { credentials, realm: realm.into() }
    }

    fn check(&self, req: &Request) -> Result<(), HttpError> {
        let header = req
            .header(AUTHORIZATION)
            .ok_or_else(|| HttpError::Unauthorized("no HTTP Basic auth specified".into()))?;
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(|| HttpError::Unauthorized("no HTTP Basic auth specified".into()))?;
        let decoded = BASE64
            .decode(encoded)
            .map_err(|err| HttpError::Unauthorized(err.to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| HttpError::Unauthorized("malformed HTTP Basic auth specified".into()))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| HttpError::Unauthorized("malformed HTTP Basic auth specified".into()))?;
        match self.credentials.get(username) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(HttpError::Unauthorized("unauthorized".into())),
        }
    }
}

impl Stage for BasicAuth {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        match self.check(&req) {
            Ok(()) => next.run(req),
            Err(err) => {
                let mut response = error_response(&err, req.accepts_json());
                response
                    .insert_header(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", self.realm));
                ready(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxedHandler, ErasedHandler, Handler};
    use crate::middleware::PipelineBuilder;
    use crate::response::Response;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use url::Url;

    fn protected() -> BoxedHandler {
        let terminal =
            (|_req: Request| async { Response::text("secret") }).into_boxed_handler();
        let mut credentials = HashMap::new();
        credentials.insert("alice".to_owned(), "opensesame".to_owned());
        PipelineBuilder::new().stage(BasicAuth::new(credentials, "cave")).finish(terminal)
    }

    fn req(authorization: Option<&str>) -> Request {
        let url = Url::parse("http://example.com/secret").unwrap();
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, value.parse().unwrap());
        }
        Request::new(Method::GET, url, headers, Bytes::new())
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
    }

    #[tokio::test]
    async fn missing_header_is_challenged() {
        let response = protected().call(req(None)).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
        assert_eq!(Some("Basic realm=\"cave\""), response.header(WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn non_basic_scheme_is_challenged() {
        let response = protected().call(req(Some("Bearer token"))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
    }

    #[tokio::test]
    async fn garbage_base64_is_challenged() {
        let response = protected().call(req(Some("Basic !!!"))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
    }

    #[tokio::test]
    async fn missing_colon_is_challenged() {
        let value = format!("Basic {}", BASE64.encode("alicenopassword"));
        let response = protected().call(req(Some(&value))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
    }

    #[tokio::test]
    async fn wrong_password_is_challenged() {
        let response = protected().call(req(Some(&basic("alice", "wrong")))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
    }

    #[tokio::test]
    async fn unknown_user_is_challenged() {
        let response = protected().call(req(Some(&basic("mallory", "opensesame")))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status_code());
    }

    #[tokio::test]
    async fn valid_credentials_pass_through() {
        let response = protected().call(req(Some(&basic("alice", "opensesame")))).await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!(b"secret".as_slice(), response.body());
    }
}
