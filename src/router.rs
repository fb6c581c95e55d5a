//! Path-trie request router.
//!
//! One trie over `/`-delimited segments, method-sensitive at the leaves.
//! Segments wrapped in braces (`/users/{id}`) match any single path
//! component and bind it as a parameter under both `id` and `{id}`.
//!
//! The table is built once at startup by chaining [`Router::on`] /
//! [`Router::route`] calls and is immutable afterwards; every connection
//! task reads it concurrently without locking. Resolution is total: a
//! request either reaches a handler, a 404, or a 405 — the 405 path also
//! answers `OPTIONS` (with the allowed-method enumeration) and CORS
//! preflights (by consulting the registered handler's policy).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use http::Method;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ALLOW, ORIGIN,
};
use serde::Serialize;

use crate::error::{HttpError, error_response};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, ready};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// directly or as the terminal handler of a middleware pipeline. Each
/// registration call returns `self` so registrations chain naturally.
pub struct Router {
    root: TrieNode,
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// The braced literal (`"{id}"`) keying this node's wildcard child in
    /// `children`. At most one per node; the last registration wins.
    wildcard: Option<String>,
    methods: HashMap<Method, BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { root: TrieNode::default() }
    }

    /// Registers a plain async handler for a method + pattern pair.
    ///
    /// Patterns are `/`-delimited; a segment wrapped in braces matches any
    /// single component and binds it — `req.param("name")` retrieves it.
    /// Registering the same (method, pattern) twice silently replaces the
    /// earlier handler, and a second braced segment registered at the same
    /// depth replaces the earlier wildcard for that subtree.
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.route(method, pattern, handler.into_boxed_handler())
    }

    /// Registers a pre-boxed handler — a marshaled JSON handler, a
    /// CORS-wrapped handler, or a nested dispatcher.
    pub fn route(mut self, method: Method, pattern: &str, handler: BoxedHandler) -> Self {
        tracing::debug!(%method, pattern, "route registered");
        let segments: Vec<&str> = pattern.split('/').skip(1).collect();
        add_route(&mut self.root, method, &segments, handler);
        self
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl ErasedHandler for Router {
    fn call(&self, mut req: Request) -> BoxFuture {
        let path = req.url().path().to_owned();
        let segments: Vec<&str> = path.split('/').skip(1).collect();
        match find_route(&self.root, req.method(), &segments) {
            Resolution::Matched { handler, params } => {
                let handler = Arc::clone(handler);
                req.bind_params(params);
                handler.call(req)
            }
            Resolution::MethodNotAllowed { node } => ready(method_not_allowed_response(node, &req)),
            Resolution::NotFound => ready(not_found_response(&req)),
        }
    }
}

// ── Trie construction and lookup ──────────────────────────────────────────────

fn add_route(node: &mut TrieNode, method: Method, segments: &[&str], handler: BoxedHandler) {
    let Some((segment, rest)) = segments.split_first() else {
        node.methods.insert(method, handler);
        return;
    };
    if segment.starts_with('{') && segment.ends_with('}') {
        node.wildcard = Some((*segment).to_owned());
    }
    let child = node.children.entry((*segment).to_owned()).or_default();
    add_route(child, method, rest, handler);
}

enum Resolution<'a> {
    Matched { handler: &'a BoxedHandler, params: Vec<(String, String)> },
    MethodNotAllowed { node: &'a TrieNode },
    NotFound,
}

/// Recursive lookup. An exact literal child always wins over the wildcard at
/// the same depth, and a failed literal subtree is not retried against the
/// wildcard. Parameters are pushed while the recursion unwinds; a name bound
/// at a deeper level is not overwritten by a shallower one.
fn find_route<'a>(node: &'a TrieNode, method: &Method, segments: &[&str]) -> Resolution<'a> {
    let Some((segment, rest)) = segments.split_first() else {
        return match node.methods.get(method) {
            Some(handler) => Resolution::Matched { handler, params: Vec::new() },
            None => Resolution::MethodNotAllowed { node },
        };
    };
    if let Some(child) = node.children.get(*segment) {
        return find_route(child, method, rest);
    }
    if let Some(key) = &node.wildcard {
        let child = &node.children[key];
        let mut resolution = find_route(child, method, rest);
        if let Resolution::Matched { params, .. } = &mut resolution {
            let name = &key[1..key.len() - 1];
            if !params.iter().any(|(bound, _)| bound == name) {
                params.push((name.to_owned(), (*segment).to_owned()));
                params.push((key.clone(), (*segment).to_owned()));
            }
        }
        return resolution;
    }
    Resolution::NotFound
}

// ── 404 / 405 / OPTIONS synthesis ─────────────────────────────────────────────

/// The standard 404 response: JSON error body when the client accepts JSON,
/// plain text otherwise. Also used by the hostname dispatcher.
pub(crate) fn not_found_response(req: &Request) -> Response {
    let err = HttpError::NotFound(format!("{} {} not found", req.method(), req.url().path()));
    error_response(&err, req.accepts_json())
}

#[derive(Serialize)]
struct AllowBody<'a> {
    allow: &'a [String],
}

/// Sorted union of the node's registered methods, plus synthetic `OPTIONS`
/// always and `HEAD` when `GET` is registered.
fn allowed_methods(node: &TrieNode) -> Vec<String> {
    let mut methods = BTreeSet::new();
    methods.insert(Method::OPTIONS.to_string());
    if node.methods.contains_key(&Method::GET) {
        methods.insert(Method::HEAD.to_string());
    }
    for method in node.methods.keys() {
        methods.insert(method.to_string());
    }
    methods.into_iter().collect()
}

fn method_not_allowed_response(node: &TrieNode, req: &Request) -> Response {
    let methods = allowed_methods(node);
    let allow = methods.join(", ");
    if *req.method() == Method::OPTIONS {
        let mut response = if req.accepts_json() {
            Response::json(serde_json::to_vec(&AllowBody { allow: &methods }).unwrap_or_default())
        } else {
            Response::text(allow.clone())
        };
        response.insert_header(ALLOW, &allow);
        if let Some(preflight) = req.header(ACCESS_CONTROL_REQUEST_METHOD).filter(|m| !m.is_empty())
        {
            response.insert_header(ACCESS_CONTROL_ALLOW_METHODS, &allow);
            let policy = Method::from_bytes(preflight.as_bytes())
                .ok()
                .and_then(|method| node.methods.get(&method))
                .and_then(|handler| handler.cors_policy());
            if let Some(origin) = req.header(ORIGIN).filter(|o| !o.is_empty()) {
                let allowed_origin =
                    policy.map_or("null", |policy| policy.allow_origin_for(origin)).to_owned();
                response.insert_header(ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin);
            }
            if req.header(ACCESS_CONTROL_REQUEST_HEADERS).is_some_and(|h| !h.is_empty()) {
                let allowed = policy.map(|p| p.allowed_headers_value()).unwrap_or_default();
                response.insert_header(ACCESS_CONTROL_ALLOW_HEADERS, allowed);
            }
        }
        response
    } else {
        let err = HttpError::MethodNotAllowed(format!("only {allow} are allowed"));
        let mut response = error_response(&err, req.accepts_json());
        response.insert_header(ALLOW, &allow);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::CorsBuilder;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use url::Url;

    fn req(method: Method, path: &str) -> Request {
        let url = Url::parse(&format!("http://example.com{path}")).unwrap();
        Request::new(method, url, HeaderMap::new(), Bytes::new())
    }

    fn req_with(method: Method, path: &str, headers: &[(&str, &str)]) -> Request {
        let url = Url::parse(&format!("http://example.com{path}")).unwrap();
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                http::header::HeaderName::try_from(*name).unwrap(),
                value.parse().unwrap(),
            );
        }
        Request::new(method, url, map, Bytes::new())
    }

    async fn no_content(_req: Request) -> StatusCode {
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let _guard = crate::error::test_support::lock_wire_names();
        let router = Router::new();
        let response = router.call(req(Method::GET, "/")).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());
        assert_eq!(
            br#"{"description":"GET / not found","error":"NotFound"}"#.as_slice(),
            response.body()
        );
    }

    #[tokio::test]
    async fn unregistered_method_is_405_with_allow() {
        let _guard = crate::error::test_support::lock_wire_names();
        let router = Router::new().on(Method::POST, "/", no_content);
        let response = router.call(req(Method::GET, "/")).await;
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status_code());
        assert_eq!(Some("OPTIONS, POST"), response.header(ALLOW));
        assert_eq!(
            br#"{"description":"only OPTIONS, POST are allowed","error":"MethodNotAllowed"}"#
                .as_slice(),
            response.body()
        );
    }

    #[tokio::test]
    async fn options_enumerates_methods_and_succeeds() {
        let router = Router::new()
            .on(Method::GET, "/foo", no_content)
            .on(Method::POST, "/bar", no_content);

        let response = router.call(req(Method::OPTIONS, "/foo")).await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!(Some("GET, HEAD, OPTIONS"), response.header(ALLOW));
        assert_eq!(br#"{"allow":["GET","HEAD","OPTIONS"]}"#.as_slice(), response.body());

        let response = router.call(req(Method::OPTIONS, "/bar")).await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!(Some("OPTIONS, POST"), response.header(ALLOW));
    }

    #[tokio::test]
    async fn root_route_resolves() {
        let router = Router::new().on(Method::GET, "/", no_content);
        let response = router.call(req(Method::GET, "/")).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
    }

    #[tokio::test]
    async fn deep_literal_route_resolves() {
        let router = Router::new().on(Method::GET, "/foo/bar/baz", no_content);
        let response = router.call(req(Method::GET, "/foo/bar/baz")).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
        let response = router.call(req(Method::GET, "/foo/bar")).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());
    }

    #[tokio::test]
    async fn wildcards_bind_both_spellings() {
        let router = Router::new().on(Method::GET, "/{foo}/{bar}", |req: Request| async move {
            assert_eq!(Some("bar"), req.param("foo"));
            assert_eq!(Some("foo"), req.param("bar"));
            assert_eq!(Some("bar"), req.param("{foo}"));
            assert_eq!(Some("foo"), req.param("{bar}"));
            StatusCode::NO_CONTENT
        });
        let response = router.call(req(Method::GET, "/bar/foo")).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
    }

    #[tokio::test]
    async fn literal_beats_wildcard_at_the_same_depth() {
        let router = Router::new()
            .on(Method::GET, "/stuff/exact", |_req: Request| async { "exact" })
            .on(Method::GET, "/stuff/{id}", |_req: Request| async { "wild" });
        let response = router.call(req(Method::GET, "/stuff/exact")).await;
        assert_eq!(b"exact".as_slice(), response.body());
        let response = router.call(req(Method::GET, "/stuff/42")).await;
        assert_eq!(b"wild".as_slice(), response.body());
    }

    #[tokio::test]
    async fn deeper_binding_wins_on_name_collision() {
        let router = Router::new().on(Method::GET, "/{a}/{a}", |req: Request| async move {
            assert_eq!(Some("second"), req.param("a"));
            StatusCode::NO_CONTENT
        });
        let response = router.call(req(Method::GET, "/first/second")).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
    }

    #[tokio::test]
    async fn last_wildcard_registration_wins() {
        let router = Router::new()
            .on(Method::GET, "/x/{a}/one", no_content)
            .on(Method::GET, "/x/{b}/two", no_content);
        // The `{b}` registration replaced `{a}` as the wildcard subtree.
        let response = router.call(req(Method::GET, "/x/anything/two")).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
        let response = router.call(req(Method::GET, "/x/anything/one")).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());
    }

    #[tokio::test]
    async fn reregistration_replaces_the_handler() {
        let router = Router::new()
            .on(Method::GET, "/v", |_req: Request| async { "old" })
            .on(Method::GET, "/v", |_req: Request| async { "new" });
        let response = router.call(req(Method::GET, "/v")).await;
        assert_eq!(b"new".as_slice(), response.body());
    }

    #[tokio::test]
    async fn plain_text_404_when_json_not_accepted() {
        let router = Router::new();
        let response = router.call(req_with(Method::GET, "/nope", &[("accept", "text/html")])).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());
        assert_eq!(b"GET /nope not found".as_slice(), response.body());
    }

    #[tokio::test]
    async fn preflight_consults_the_handler_policy() {
        let wildcard = CorsBuilder::new()
            .allowed_origin("*")
            .build((no_content).into_boxed_handler());
        let locked = CorsBuilder::new()
            .allowed_origin("http://gooddomain.com")
            .allowed_header("x-request-id")
            .build((no_content).into_boxed_handler());
        let router = Router::new()
            .route(Method::GET, "/foo", wildcard)
            .route(Method::GET, "/baz", locked);

        // Preflight without an origin: methods are enumerated.
        let response = router
            .call(req_with(
                Method::OPTIONS,
                "/baz",
                &[("access-control-request-method", "GET")],
            ))
            .await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!(Some("GET, HEAD, OPTIONS"), response.header(ACCESS_CONTROL_ALLOW_METHODS));

        // Unwelcome origin against the locked resource.
        let response = router
            .call(req_with(
                Method::OPTIONS,
                "/baz",
                &[
                    ("access-control-request-method", "GET"),
                    ("origin", "http://baddomain.com"),
                ],
            ))
            .await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!(Some("null"), response.header(ACCESS_CONTROL_ALLOW_ORIGIN));

        // Any origin against the wildcard resource.
        let response = router
            .call(req_with(
                Method::OPTIONS,
                "/foo",
                &[
                    ("access-control-request-method", "GET"),
                    ("origin", "http://baddomain.com"),
                ],
            ))
            .await;
        assert_eq!(Some("*"), response.header(ACCESS_CONTROL_ALLOW_ORIGIN));

        // Matching origin is echoed back, with the allowed headers.
        let response = router
            .call(req_with(
                Method::OPTIONS,
                "/baz",
                &[
                    ("access-control-request-method", "GET"),
                    ("origin", "http://gooddomain.com"),
                    ("access-control-request-headers", "x-request-id"),
                ],
            ))
            .await;
        assert_eq!(Some("http://gooddomain.com"), response.header(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(Some("x-request-id"), response.header(ACCESS_CONTROL_ALLOW_HEADERS));
    }

    #[tokio::test]
    async fn cors_wrapper_stamps_normal_responses() {
        let handler = CorsBuilder::new()
            .allowed_origin("http://gooddomain.com")
            .build((no_content).into_boxed_handler());
        let router = Router::new().route(Method::GET, "/baz", handler);
        let response = router
            .call(req_with(Method::GET, "/baz", &[("origin", "http://gooddomain.com")]))
            .await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
        assert_eq!(Some("http://gooddomain.com"), response.header(ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
