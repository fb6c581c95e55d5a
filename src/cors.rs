//! Cross-origin request policy and handler wrapper.
//!
//! A [`CorsPolicy`] is a configured allowed origin (a literal origin or the
//! wildcard `*`) plus a list of request headers the resource accepts.
//! [`CorsBuilder`] decorates any handler so that responses to requests
//! carrying an `Origin` header get `Access-Control-Allow-Origin`, and the
//! policy stays reachable through the erased handler so the router's
//! `OPTIONS` synthesis can answer preflights without re-deriving it.
//!
//! Only the origin and allowed-headers parts of CORS are interpreted here.
//! Credentials, max-age, and exposed headers are not handled — a known
//! limitation, not an oversight.

use std::sync::Arc;

use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;

/// The configured cross-origin policy for one resource.
pub struct CorsPolicy {
    allowed_origin: String,
    allowed_headers: Vec<String>,
}

impl CorsPolicy {
    /// The allow-origin value for a request from `request_origin`: `*` for a
    /// wildcard policy, the request origin when it matches the configured
    /// one, else the literal string `"null"`.
    pub fn allow_origin_for<'a>(&'a self, request_origin: &'a str) -> &'a str {
        if self.allowed_origin == "*" {
            "*"
        } else if self.allowed_origin == request_origin {
            request_origin
        } else {
            "null"
        }
    }

    /// The comma-joined allowed request headers, as written to
    /// `Access-Control-Allow-Headers`.
    pub fn allowed_headers_value(&self) -> String {
        self.allowed_headers.join(", ")
    }
}

/// Builds a CORS-wrapped handler.
///
/// ```rust,no_run
/// # use torii::{CorsBuilder, Method, Router};
/// # let get_stuff: torii::BoxedHandler = todo!();
/// let app = Router::new().route(
///     Method::GET,
///     "/stuff/{id}",
///     CorsBuilder::new()
///         .allowed_origin("https://ui.example.com")
///         .allowed_header("x-request-id")
///         .build(get_stuff),
/// );
/// ```
pub struct CorsBuilder {
    policy: CorsPolicy,
}

impl CorsBuilder {
    /// A policy that allows nothing until an origin is configured: with no
    /// allowed origin set, every cross-origin response is `"null"`.
    pub fn new() -> Self {
        Self { policy: CorsPolicy { allowed_origin: String::new(), allowed_headers: Vec::new() } }
    }

    /// Sets the allowed origin — a literal origin or `*`.
    pub fn allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.policy.allowed_origin = origin.into();
        self
    }

    /// Adds a request header the resource accepts in preflight.
    pub fn allowed_header(mut self, name: impl Into<String>) -> Self {
        self.policy.allowed_headers.push(name.into());
        self
    }

    /// Wraps `handler` with this policy.
    pub fn build(self, handler: BoxedHandler) -> BoxedHandler {
        Arc::new(CorsHandler { policy: self.policy, inner: handler })
    }
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct CorsHandler {
    policy: CorsPolicy,
    inner: BoxedHandler,
}

impl ErasedHandler for CorsHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let allow = req.header(ORIGIN).map(|origin| self.policy.allow_origin_for(origin).to_owned());
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await;
            if let Some(allow) = allow {
                response.insert_header(ACCESS_CONTROL_ALLOW_ORIGIN, allow);
            }
            response
        })
    }

    fn cors_policy(&self) -> Option<&CorsPolicy> {
        Some(&self.policy)
    }
}
