//! Middleware: an explicit, ordered pipeline of stages.
//!
//! A [`Stage`] sees the request on the way in and the response on the way
//! out; it never alters routing or marshaling semantics. Stages compose
//! through [`PipelineBuilder`] around a terminal handler — usually the
//! router — instead of by hand-nesting wrapper structs:
//!
//! ```rust,no_run
//! use torii::middleware::{PipelineBuilder, StatusCounters, Trace};
//! # use torii::Router;
//! # use std::sync::Arc;
//!
//! let app = PipelineBuilder::new()
//!     .stage(Trace)
//!     .stage(StatusCounters::new("api"))
//!     .finish(Arc::new(Router::new()));
//! ```
//!
//! Stages run in registration order on the way in and unwind in reverse on
//! the way out.

use std::sync::Arc;
use std::time::Instant;

use crate::handler::{BoxedHandler, ErasedHandler};
use crate::request::Request;

pub use crate::handler::BoxFuture;

/// One step of the pipeline.
///
/// Call `next.run(req)` to continue; produce a response directly to short-
/// circuit (the basic-auth stage does exactly that on bad credentials).
pub trait Stage: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the pipeline from a stage's point of view.
pub struct Next {
    stages: Arc<[Arc<dyn Stage>]>,
    index: usize,
    terminal: BoxedHandler,
}

impl Next {
    /// Runs the rest of the pipeline and the terminal handler.
    pub fn run(mut self, req: Request) -> BoxFuture {
        if self.index < self.stages.len() {
            let stage = Arc::clone(&self.stages[self.index]);
            self.index += 1;
            stage.handle(req, self)
        } else {
            self.terminal.call(req)
        }
    }
}

/// Composes stages around a terminal handler.
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage. Order matters: the first stage added is the
    /// outermost.
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Closes the pipeline over its terminal handler.
    pub fn finish(self, terminal: BoxedHandler) -> BoxedHandler {
        Arc::new(Pipeline { stages: self.stages.into(), terminal })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
    terminal: BoxedHandler,
}

impl ErasedHandler for Pipeline {
    fn call(&self, req: Request) -> BoxFuture {
        Next {
            stages: Arc::clone(&self.stages),
            index: 0,
            terminal: Arc::clone(&self.terminal),
        }
        .run(req)
    }
}

// ── Built-in stages ───────────────────────────────────────────────────────────

/// Logs one line per request: method, path, status, latency.
pub struct Trace;

impl Stage for Trace {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let method = req.method().clone();
        let path = req.url().path().to_owned();
        let start = Instant::now();
        let fut = next.run(req);
        Box::pin(async move {
            let response = fut.await;
            tracing::info!(
                %method,
                path,
                status = response.status_code().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request"
            );
            response
        })
    }
}

/// Counts requests and responses-by-status-class under a handler name.
///
/// Emits `requests_total{handler}` and `responses_total{handler, class}`
/// where `class` is `1xx` … `5xx`.
pub struct StatusCounters {
    name: &'static str,
}

impl StatusCounters {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Stage for StatusCounters {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let name = self.name;
        metrics::counter!("requests_total", "handler" => name).increment(1);
        let fut = next.run(req);
        Box::pin(async move {
            let response = fut.await;
            let class = format!("{}xx", response.status_code().as_u16() / 100);
            metrics::counter!("responses_total", "handler" => name, "class" => class).increment(1);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn req() -> Request {
        let url = Url::parse("http://example.com/").unwrap();
        Request::new(Method::GET, url, HeaderMap::new(), Bytes::new())
    }

    struct Tag {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stage for Tag {
        fn handle(&self, req: Request, next: Next) -> BoxFuture {
            self.seen.lock().unwrap().push(self.name);
            next.run(req)
        }
    }

    struct Terminal {
        calls: Arc<AtomicUsize>,
    }

    impl ErasedHandler for Terminal {
        fn call(&self, _req: Request) -> BoxFuture {
            self.calls.fetch_add(1, Ordering::Relaxed);
            crate::handler::ready(Response::status(StatusCode::NO_CONTENT))
        }
    }

    #[tokio::test]
    async fn stages_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = PipelineBuilder::new()
            .stage(Tag { name: "outer", seen: Arc::clone(&seen) })
            .stage(Tag { name: "inner", seen: Arc::clone(&seen) })
            .finish(Arc::new(Terminal { calls: Arc::clone(&calls) }));

        let response = app.call(req()).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
        assert_eq!(vec!["outer", "inner"], *seen.lock().unwrap());
        assert_eq!(1, calls.load(Ordering::Relaxed));
    }

    struct ShortCircuit;

    impl Stage for ShortCircuit {
        fn handle(&self, _req: Request, _next: Next) -> BoxFuture {
            crate::handler::ready(Response::status(StatusCode::TOO_MANY_REQUESTS))
        }
    }

    #[tokio::test]
    async fn a_stage_can_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = PipelineBuilder::new()
            .stage(ShortCircuit)
            .finish(Arc::new(Terminal { calls: Arc::clone(&calls) }));

        let response = app.call(req()).await;
        assert_eq!(StatusCode::TOO_MANY_REQUESTS, response.status_code());
        assert_eq!(0, calls.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn an_empty_pipeline_is_just_the_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = PipelineBuilder::new().finish(Arc::new(Terminal { calls: Arc::clone(&calls) }));
        app.call(req()).await;
        assert_eq!(1, calls.load(Ordering::Relaxed));
    }
}
