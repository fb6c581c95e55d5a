//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, header};
use url::Url;

/// An incoming HTTP request, as seen by handlers.
///
/// The URL is absolute — the transport fills in the scheme and the `Host`
/// header — so handlers can read `req.url().host_str()` and query pairs
/// without reparsing anything. Path parameters bound by the router are
/// available both through [`Request::param`] and as query pairs on the URL
/// (under `name` and `{name}`), so marshaled handlers that only receive the
/// URL still see them.
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self { method, url, headers, body, params: HashMap::new() }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns
    /// `Some("42")`. The braced spelling `req.param("{id}")` works too.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Whether the client accepts a JSON response.
    ///
    /// An absent or empty `Accept` header is acceptable; otherwise the header
    /// must mention `*/*` or `application/json`.
    pub fn accepts_json(&self) -> bool {
        match self.header(header::ACCEPT) {
            None | Some("") => true,
            Some(accept) => accept.contains("*/*") || accept.contains("application/json"),
        }
    }

    /// Records the path parameters bound by the router, mirroring each pair
    /// into the URL's query so URL-only consumers see them as well.
    pub(crate) fn bind_params(&mut self, params: Vec<(String, String)>) {
        if params.is_empty() {
            return;
        }
        {
            let mut pairs = self.url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }
        for (key, value) in params {
            self.params.entry(key).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: HeaderMap) -> Request {
        let url = Url::parse("http://example.com/stuff/42").unwrap();
        Request::new(Method::GET, url, headers, Bytes::new())
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse().unwrap());
        let req = request(headers);
        assert_eq!(Some("application/json"), req.header("accept"));
        assert_eq!(Some("application/json"), req.header("Accept"));
    }

    #[test]
    fn absent_accept_header_is_acceptable() {
        assert!(request(HeaderMap::new()).accepts_json());
    }

    #[test]
    fn wildcard_and_json_accepts() {
        for value in ["*/*", "application/json", "text/html, */*;q=0.1"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::ACCEPT, value.parse().unwrap());
            assert!(request(headers).accepts_json(), "{value}");
        }
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "text/xml".parse().unwrap());
        assert!(!request(headers).accepts_json());
    }

    #[test]
    fn bound_params_show_up_in_url_query() {
        let mut req = request(HeaderMap::new());
        req.bind_params(vec![
            ("id".to_owned(), "42".to_owned()),
            ("{id}".to_owned(), "42".to_owned()),
        ]);
        assert_eq!(Some("42"), req.param("id"));
        assert_eq!(Some("42"), req.param("{id}"));
        let query: Vec<(String, String)> = req
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("id".to_owned(), "42".to_owned())));
        assert!(query.contains(&("{id}".to_owned(), "42".to_owned())));
    }
}
