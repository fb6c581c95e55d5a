//! Hostname-based dispatch.
//!
//! Routes a request to the handler registered for its hostname and nothing
//! else — it never looks at the path. Unknown hostnames get the standard
//! 404 body. Matching is by hostname only (the URL's host component), so a
//! nonstandard port does not need its own registration.

use std::collections::HashMap;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::router::not_found_response;

/// Maps hostnames to handlers, usually to whole [`Router`](crate::Router)s.
pub struct HostRouter {
    hosts: HashMap<String, BoxedHandler>,
}

impl HostRouter {
    pub fn new() -> Self {
        Self { hosts: HashMap::new() }
    }

    /// Registers a handler for a hostname. Returns `self` for chaining.
    pub fn host(mut self, hostname: impl Into<String>, handler: BoxedHandler) -> Self {
        let hostname = hostname.into();
        tracing::debug!(hostname, "host registered");
        self.hosts.insert(hostname, handler);
        self
    }
}

impl Default for HostRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErasedHandler for HostRouter {
    fn call(&self, req: Request) -> BoxFuture {
        let hostname = req.url().host_str().unwrap_or_default();
        match self.hosts.get(hostname) {
            Some(handler) => handler.call(req),
            None => crate::handler::ready(not_found_response(&req)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use url::Url;

    fn req(host: &str) -> Request {
        let url = Url::parse(&format!("http://{host}/whatever")).unwrap();
        Request::new(Method::GET, url, HeaderMap::new(), Bytes::new())
    }

    fn apps() -> HostRouter {
        HostRouter::new()
            .host("api.example.com", (|_req: Request| async { "api" }).into_boxed_handler())
            .host("www.example.com", (|_req: Request| async { "www" }).into_boxed_handler())
    }

    #[tokio::test]
    async fn dispatches_by_hostname() {
        let apps = apps();
        assert_eq!(b"api".as_slice(), apps.call(req("api.example.com")).await.body());
        assert_eq!(b"www".as_slice(), apps.call(req("www.example.com")).await.body());
    }

    #[tokio::test]
    async fn unknown_hostname_is_404() {
        let response = apps().call(req("other.example.com")).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());
    }

    #[tokio::test]
    async fn the_port_does_not_matter() {
        let response = apps().call(req("api.example.com:8080")).await;
        assert_eq!(b"api".as_slice(), response.body());
    }
}
