//! Minimal torii example — typed JSON endpoints behind a traced pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/stuff/42
//!   curl -X POST http://localhost:3000/stuff \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X OPTIONS -i http://localhost:3000/stuff
//!   curl -X DELETE -i http://localhost:3000/stuff/42   # 405 + Allow

use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use torii::middleware::{PipelineBuilder, StatusCounters, Trace};
use torii::{CorsBuilder, HttpError, Method, Reply, Router, Server, marshaled, marshaled_body};
use url::Url;

#[derive(Serialize)]
struct Stuff {
    id: String,
    name: String,
}

#[derive(Deserialize, Default)]
struct CreateStuff {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .route(
            Method::GET,
            "/stuff/{id}",
            CorsBuilder::new().allowed_origin("*").build(marshaled(get_stuff)),
        )
        .route(Method::POST, "/stuff", marshaled_body(create_stuff));

    let app = PipelineBuilder::new()
        .stage(Trace)
        .stage(StatusCounters::new("stuff"))
        .finish(Arc::new(router));

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /stuff/{id} — the path parameter arrives on the URL's query pairs.
async fn get_stuff(url: Url, _headers: HeaderMap) -> Result<Reply<Stuff>, HttpError> {
    let id = url
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    Ok(Reply::with_body(StatusCode::OK, Stuff { id, name: "alice".into() }))
}

// POST /stuff — the body is decoded into CreateStuff before we run.
async fn create_stuff(
    _url: Url,
    _headers: HeaderMap,
    rq: CreateStuff,
) -> Result<Reply<Stuff>, HttpError> {
    if rq.name.is_empty() {
        return Err(HttpError::UnprocessableEntity("name must not be empty".into()));
    }
    Ok(Reply::with_body(StatusCode::CREATED, Stuff { id: "99".into(), name: rq.name })
        .header("location", "/stuff/99"))
}
