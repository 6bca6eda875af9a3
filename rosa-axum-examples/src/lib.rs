//! Demo routes shared by the demo server and the end-to-end test runner.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use bytes::Bytes;
use futures::StreamExt;
use rosa_axum::prelude::*;
use serde::{Deserialize, Serialize};

/// Returns the server address from PORT env var, defaulting to 3000.
pub fn server_addr() -> anyhow::Result<SocketAddr> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    Ok(format!("0.0.0.0:{port}").parse()?)
}

/// Install the tracing subscriber used by the demo binaries.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rosa_axum=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[derive(Serialize)]
struct Project {
    id: u32,
    name: &'static str,
}

#[derive(Deserialize, Serialize)]
pub struct Greeting {
    pub name: String,
}

const FORM_LIST: &str = "<xforms xmlns=\"http://openrosa.org/xforms/xformsList\">\
<xform><formID>simple</formID><name>Simple</name><version>1</version></xform>\
</xforms>";

/// Build the demo router.
///
/// | Route | Shows |
/// |-------|-------|
/// | `GET /v1/projects` | deferred JSON value |
/// | `GET /v1/projects/missing` | classified error |
/// | `POST /v1/greetings` | JSON body decoding, malformed bodies |
/// | `GET /v1/export.csv` | streaming body with release hook |
/// | `GET /v1/empty` | absent result |
/// | `GET /v1/broken` | unclassified fault |
/// | `GET /formList` | OpenRosa reply |
/// | `HEAD/POST /submission` | OpenRosa submission |
pub fn routes(adapters: &Adapters) -> Router {
    Router::new()
        .route(
            "/v1/projects",
            get(adapters.endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::from_future(async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(vec![
                        Project { id: 1, name: "Default Project" },
                        Project { id: 2, name: "Water Points" },
                    ])
                })
            })),
        )
        .route(
            "/v1/projects/missing",
            get(adapters.endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::<()>::problem(Problem::not_found())
            })),
        )
        .route(
            "/v1/greetings",
            post(adapters.endpoint(|req: &mut RequestContext, _: &mut ResponseContext| {
                let body = req.json::<Greeting>();
                Outcome::from_future(async move {
                    let greeting = body.await?;
                    Ok(serde_json::json!({ "message": format!("hello, {}", greeting.name) }))
                })
            })),
        )
        .route(
            "/v1/export.csv",
            get(adapters.endpoint(|_: &mut RequestContext, res: &mut ResponseContext| {
                res.set_header("content-type", "text/csv");
                let rows = futures::stream::iter(0..3)
                    .map(|i| Ok::<_, Infallible>(Bytes::from(format!("{i},row {i}\n"))));
                Outcome::<()>::stream(Streamable::new(rows).on_release(|| {
                    tracing::info!("export stream released");
                }))
            })),
        )
        .route(
            "/v1/empty",
            get(adapters.endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                None::<Outcome<()>>
            })),
        )
        .route(
            "/v1/broken",
            get(adapters.endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::<()>::from_future(async {
                    Err(Failure::fault(anyhow::anyhow!("connection pool exhausted")))
                })
            })),
        )
        .route(
            "/formList",
            get(adapters.open_rosa(|_: &mut RequestContext, res: &mut ResponseContext| {
                res.set_header("x-openrosa-form-count", "1");
                Outcome::value(OpenRosaReply::new(StatusCode::OK, FORM_LIST))
            })),
        )
        .route(
            "/submission",
            post(adapters.open_rosa(|req: &mut RequestContext, _: &mut ResponseContext| {
                let body = req.bytes();
                Outcome::from_future(async move {
                    let body = body.await?;
                    if body.is_empty() {
                        return Err(Failure::from(Problem::missing_parameter("xml_submission_file")));
                    }
                    Ok(OpenRosaReply::message(
                        StatusCode::CREATED,
                        &OpenRosaMessage::success("full submission upload was successful!"),
                    ))
                })
            }))
            .head(adapters.open_rosa(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::value(OpenRosaReply::new(StatusCode::NO_CONTENT, ""))
            })),
        )
}
