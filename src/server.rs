//! HTTP server and graceful shutdown.
//!
//! The transport owns everything below the request: connection lifecycle,
//! HTTP/1.1 vs HTTP/2, timeouts, and TLS termination (put a proxy in front
//! for that — requests are treated as plain HTTP here).
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Under Kubernetes, set `terminationGracePeriodSeconds` longer than your
//! slowest request; 30 s is a reasonable default for most APIs.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::header::HOST;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};
use url::Url;

use crate::error::{HttpError, error_response};
use crate::handler::{BoxedHandler, ErasedHandler};
use crate::request::Request;

/// The error type returned by [`Server::serve`].
///
/// Application-level errors (404, 422, …) are expressed as responses, never
/// as this type. This surfaces infrastructure failures: binding to a port
/// or accepting a connection.
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct ServeError(#[from] std::io::Error);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `app` —
    /// a [`Router`](crate::Router), a [`HostRouter`](crate::HostRouter), or
    /// a middleware pipeline around either.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve<H>(self, app: H) -> Result<(), ServeError>
    where
        H: ErasedHandler + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;

        // Arc so the dispatch table is shared across concurrent connection
        // tasks without copying it.
        let app: BoxedHandler = Arc::new(app);

        info!(addr = %self.addr, "listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop. Futures must
        // not move in memory after the first poll; `tokio::pin!` pins it on
        // the stack.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. Shutdown is checked first so a SIGTERM stops
                // accepting immediately, even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the
                    // hyper IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`, called once per request on the
                        // connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req).await }
                        });

                        // `auto::Builder` transparently handles both
                        // HTTP/1.1 and HTTP/2 — whatever the client
                        // negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not
                // grow without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection before returning.
        while tasks.join_next().await.is_some() {}

        info!("stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: adapts one hyper request, runs the app, and produces one
/// response.
///
/// The error type is [`Infallible`](std::convert::Infallible) — every
/// failure is handled internally as a response, so hyper never sees an
/// error.
async fn dispatch(
    app: BoxedHandler,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let Ok(url) = request_url(&parts.uri, &parts.headers) else {
        let err = HttpError::BadRequest(format!("unparseable request target {}", parts.uri));
        return Ok(error_response(&err, true).into_http());
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = HttpError::BadRequest(format!("reading request body: {e}"));
            return Ok(error_response(&err, true).into_http());
        }
    };

    let request = Request::new(parts.method, url, parts.headers, body);
    Ok(app.call(request).await.into_http())
}

/// Rebuilds the absolute request URL from the request target and the `Host`
/// header, so handlers downstream can read host, path, and query off one
/// value.
fn request_url(uri: &http::Uri, headers: &HeaderMap) -> Result<Url, url::ParseError> {
    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| headers.get(HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    Url::parse(&format!("http://{host}{path_and_query}"))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by orchestrators) and
/// **SIGINT** (Ctrl-C, for local dev). On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_comes_from_the_host_header() {
        let uri: http::Uri = "/stuff/42?x=1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "api.example.com:8080".parse().unwrap());
        let url = request_url(&uri, &headers).unwrap();
        assert_eq!("api.example.com", url.host_str().unwrap());
        assert_eq!(Some(8080), url.port());
        assert_eq!("/stuff/42", url.path());
        assert_eq!(Some("x=1"), url.query());
    }

    #[test]
    fn absolute_form_targets_win_over_the_host_header() {
        let uri: http::Uri = "http://upstream.example.com/p".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "other.example.com".parse().unwrap());
        let url = request_url(&uri, &headers).unwrap();
        assert_eq!("upstream.example.com", url.host_str().unwrap());
    }

    #[test]
    fn hostless_requests_fall_back_to_localhost() {
        let uri: http::Uri = "/".parse().unwrap();
        let url = request_url(&uri, &HeaderMap::new()).unwrap();
        assert_eq!("localhost", url.host_str().unwrap());
    }
}
