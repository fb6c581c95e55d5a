//! Typed JSON handler adapter.
//!
//! Bridges the wire protocol and plain async functions. A marshaled handler
//! has one of three shapes:
//!
//! ```text
//! async fn h(url: Url, headers: HeaderMap)                  -> Result<Reply<Rs>, HttpError>
//! async fn h(url: Url, headers: HeaderMap, rq: Rq)          -> Result<Reply<Rs>, HttpError>
//! async fn h(url: Url, headers: HeaderMap, rq: Rq, ctx: C)  -> Result<Reply<Rs>, HttpError>
//! ```
//!
//! where `Rq` is any `Deserialize + Default` type, `Rs` any `Serialize`
//! type, and `C` a per-request context value produced by the factory closure
//! given to [`marshaled_ctx`]. The adapter owns everything between the wire
//! and the function: content negotiation, request-body decoding, invocation,
//! and response/error encoding. A handler with the wrong shape does not
//! register and then fail — it does not compile; the signatures above *are*
//! the validation.
//!
//! Per request, in order:
//!
//! 1. An `Accept` header that mentions neither `*/*` nor `application/json`
//!    is refused with `406` and a plain-text explanation. An absent header
//!    is acceptable.
//! 2. For the body-taking shapes with a `POST`/`PUT`/`PATCH` request, the
//!    `Content-Type` must start with `application/json` (else `415`) and the
//!    body must decode into `Rq` (else `400` carrying the decoder's
//!    message). Other methods pass `Rq::default()`.
//! 3. The function runs. `Err` is mapped through the error taxonomy to a
//!    status and a `{"description": …, "error": …}` body. `Ok` merges the
//!    returned headers (replacing, not appending), writes the status, and
//!    JSON-encodes the body value unless it is absent or the status is
//!    `204 No Content`.
//!
//! Path parameters bound by the router ride on the `Url`'s query pairs,
//! under both `name` and `{name}`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use http::header::{ACCEPT, CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{HttpError, error_response};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, ready};
use crate::request::Request;
use crate::response::Response;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a marshaled handler returns on success: a status, extra response
/// headers, and an optional body value to be JSON-encoded.
pub struct Reply<Rs> {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Rs>,
}

impl<Rs> Reply<Rs> {
    /// A bodyless reply.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: None }
    }

    /// A reply whose body will be JSON-encoded.
    pub fn with_body(status: StatusCode, body: Rs) -> Self {
        Self { status, headers: HeaderMap::new(), body: Some(body) }
    }

    /// Adds a response header. Invalid names or values are dropped with a
    /// warning rather than failing the reply.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "dropping invalid reply header"),
        }
        self
    }
}

// ── Adapter constructors ──────────────────────────────────────────────────────

/// Adapts a two-argument handler — one that takes no request body.
///
/// Requests with bodies still reach it; the body is simply not decoded.
pub fn marshaled<F, Fut, Rs>(f: F) -> BoxedHandler
where
    F: Fn(Url, HeaderMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rs: Serialize + Send + 'static,
{
    Arc::new(Marshaler(f))
}

/// Adapts a three-argument handler taking a decoded request value.
pub fn marshaled_body<F, Fut, Rq, Rs>(f: F) -> BoxedHandler
where
    F: Fn(Url, HeaderMap, Rq) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rq: DeserializeOwned + Default + Send + 'static,
    Rs: Serialize + Send + 'static,
{
    Arc::new(BodyMarshaler { f, _request: PhantomData })
}

/// Adapts a four-argument handler taking a decoded request value and a
/// request-scoped context value.
///
/// `init` runs once per request, before the handler, and its return value is
/// passed as the fourth argument — context travels down the call chain
/// explicitly instead of through shared state.
pub fn marshaled_ctx<F, Fut, Rq, Rs, C, I>(f: F, init: I) -> BoxedHandler
where
    F: Fn(Url, HeaderMap, Rq, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rq: DeserializeOwned + Default + Send + 'static,
    Rs: Serialize + Send + 'static,
    C: Send + 'static,
    I: Fn(&Request) -> C + Send + Sync + 'static,
{
    Arc::new(ContextMarshaler { f, init, _request: PhantomData })
}

// ── Adapter wrappers ──────────────────────────────────────────────────────────

struct Marshaler<F>(F);

impl<F, Fut, Rs> ErasedHandler for Marshaler<F>
where
    F: Fn(Url, HeaderMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rs: Serialize + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        if let Some(refusal) = negotiate(&req) {
            return ready(refusal);
        }
        let fut = (self.0)(req.url().clone(), req.headers().clone());
        Box::pin(async move { write_reply(fut.await) })
    }
}

struct BodyMarshaler<F, Rq> {
    f: F,
    _request: PhantomData<fn() -> Rq>,
}

impl<F, Fut, Rq, Rs> ErasedHandler for BodyMarshaler<F, Rq>
where
    F: Fn(Url, HeaderMap, Rq) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rq: DeserializeOwned + Default + Send + 'static,
    Rs: Serialize + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        if let Some(refusal) = negotiate(&req) {
            return ready(refusal);
        }
        let rq = match decode_body::<Rq>(&req) {
            Ok(rq) => rq,
            Err(refusal) => return ready(refusal),
        };
        let fut = (self.f)(req.url().clone(), req.headers().clone(), rq);
        Box::pin(async move { write_reply(fut.await) })
    }
}

struct ContextMarshaler<F, I, Rq> {
    f: F,
    init: I,
    _request: PhantomData<fn() -> Rq>,
}

impl<F, Fut, Rq, Rs, C, I> ErasedHandler for ContextMarshaler<F, I, Rq>
where
    F: Fn(Url, HeaderMap, Rq, C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply<Rs>, HttpError>> + Send + 'static,
    Rq: DeserializeOwned + Default + Send + 'static,
    Rs: Serialize + Send + 'static,
    C: Send + 'static,
    I: Fn(&Request) -> C + Send + Sync,
{
    fn call(&self, req: Request) -> BoxFuture {
        if let Some(refusal) = negotiate(&req) {
            return ready(refusal);
        }
        let rq = match decode_body::<Rq>(&req) {
            Ok(rq) => rq,
            Err(refusal) => return ready(refusal),
        };
        let ctx = (self.init)(&req);
        let fut = (self.f)(req.url().clone(), req.headers().clone(), rq, ctx);
        Box::pin(async move { write_reply(fut.await) })
    }
}

// ── Request-time steps ────────────────────────────────────────────────────────

fn negotiate(req: &Request) -> Option<Response> {
    if req.accepts_json() {
        return None;
    }
    let accept = req.header(ACCEPT).unwrap_or_default();
    Some(
        Response::builder()
            .status(StatusCode::NOT_ACCEPTABLE)
            .text(format!("Accept header is {accept}, not application/json")),
    )
}

fn bears_body(method: &Method) -> bool {
    matches!(method.as_str(), "POST" | "PUT" | "PATCH")
}

fn decode_body<Rq: DeserializeOwned + Default>(req: &Request) -> Result<Rq, Response> {
    if !bears_body(req.method()) {
        return Ok(Rq::default());
    }
    let content_type = req.header(CONTENT_TYPE).unwrap_or_default();
    if !content_type.starts_with("application/json") {
        let err = HttpError::UnsupportedMediaType(format!(
            "Content-Type header is {content_type}, not application/json"
        ));
        return Err(error_response(&err, true));
    }
    serde_json::from_slice(req.body()).map_err(|err| {
        error_response(&HttpError::Generic { status: 400, message: err.to_string() }, true)
    })
}

fn write_reply<Rs: Serialize>(result: Result<Reply<Rs>, HttpError>) -> Response {
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => return error_response(&err, true),
    };
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in reply.headers.iter() {
        headers.insert(name, value.clone());
    }
    let body = match reply.body {
        Some(value) if reply.status != StatusCode::NO_CONTENT => {
            match serde_json::to_vec(&value) {
                Ok(bytes) => bytes,
                // The status line is already decided; the most we can do for
                // an unencodable body is log it and send nothing.
                Err(err) => {
                    tracing::error!(error = %err, "response body failed to encode");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };
    Response::from_parts(reply.status, headers, body)
}
