//! # torii
//!
//! A toolkit for building JSON HTTP APIs. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! torii routes requests by method and URL pattern, and adapts ordinary
//! typed async functions into request handlers: content negotiation, JSON
//! decoding and encoding, and structured error reporting are the toolkit's
//! job, not yours. JSON is the only wire format. There is no templating, no
//! sessions, no persistence — this is for APIs, not websites.
//!
//! What the pieces do:
//!
//! - **[`Router`]** — a path trie mapping (method, pattern) to handlers,
//!   with `{name}` wildcard segments. Unmatched paths 404, unregistered
//!   methods 405 with a proper `Allow` header, and `OPTIONS` is answered
//!   for free.
//! - **[`marshaled`] / [`marshaled_body`] / [`marshaled_ctx`]** — adapt a
//!   typed `async fn` into a handler. The function's signature *is* its
//!   registration-time validation: a handler with the wrong shape does not
//!   compile.
//! - **[`HttpError`]** — the error taxonomy. Every error kind carries one
//!   canonical status and one wire name, so error bodies are uniform and
//!   auditable across a whole fleet of services.
//! - **[`CorsBuilder`]** — per-resource cross-origin policy, consulted
//!   automatically by the router's preflight answers.
//! - **[`middleware`]** — an explicit stage pipeline for the cross-cutting
//!   concerns: request tracing, status-class counters, basic auth.
//! - **[`Server`]** — tokio + hyper transport with graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{HeaderMap, StatusCode};
//! use serde::Serialize;
//! use torii::{HttpError, Method, Reply, Router, Server, marshaled};
//! use url::Url;
//!
//! #[derive(Serialize)]
//! struct Stuff {
//!     id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route(Method::GET, "/stuff/{id}", marshaled(get_stuff));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_stuff(url: Url, _headers: HeaderMap) -> Result<Reply<Stuff>, HttpError> {
//!     let id = url
//!         .query_pairs()
//!         .find(|(k, _)| k == "id")
//!         .map(|(_, v)| v.into_owned())
//!         .ok_or_else(|| HttpError::NotFound("no such stuff".into()))?;
//!     Ok(Reply::with_body(StatusCode::OK, Stuff { id }))
//! }
//! ```

mod auth;
mod cors;
mod error;
mod handler;
mod host;
mod marshal;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod middleware;

pub use auth::BasicAuth;
pub use cors::{CorsBuilder, CorsPolicy};
pub use error::{HttpError, set_snake_case_wire_names};
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use host::HostRouter;
pub use marshal::{Reply, marshaled, marshaled_body, marshaled_ctx};
pub use request::Request;
pub use response::{IntoResponse, Response};
pub use router::Router;
pub use server::{ServeError, Server};

// The HTTP vocabulary types are the `http` crate's; re-exported so
// applications don't need a direct dependency for the common cases.
pub use http::{HeaderMap, Method, StatusCode, header};
