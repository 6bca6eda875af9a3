//! The JSON endpoint adapter.
//!
//! [`Endpoint`] wraps a handler of shape
//! `Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<T>>` and
//! implements axum's [`Handler`], so it can be mounted on any route:
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use rosa_axum::prelude::*;
//!
//! let app: Router = Router::new().route(
//!     "/v1/projects",
//!     get(endpoint(|_req: &mut RequestContext, _res: &mut ResponseContext| {
//!         Outcome::value(serde_json::json!([{ "id": 1 }]))
//!     })),
//! );
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use axum::{
    body::Body,
    extract::Request,
    handler::Handler,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;

use crate::context::{BodyLimits, RequestContext, ResponseContext};
use crate::error::Failure;
use crate::outcome::Outcome;
use crate::resolve::{Resolved, resolve};
use crate::stream_response::stream_response;
use crate::translate::ErrorTranslator;

const APPLICATION_JSON: &str = "application/json";

/// A handler adapted to the JSON protocol.
pub struct Endpoint<F, T> {
    handler: F,
    translator: ErrorTranslator,
    limits: BodyLimits,
    _marker: PhantomData<fn() -> T>,
}

impl<F: Clone, T> Clone for Endpoint<F, T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            translator: self.translator.clone(),
            limits: self.limits,
            _marker: PhantomData,
        }
    }
}

impl<F, T> Endpoint<F, T> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            translator: ErrorTranslator::default(),
            limits: BodyLimits::default(),
            _marker: PhantomData,
        }
    }

    /// Render failures with this translator.
    pub fn translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Limit request bodies read through the [`RequestContext`].
    pub fn limits(mut self, limits: BodyLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Adapt a handler to the JSON protocol with default settings.
pub fn endpoint<F, T>(handler: F) -> Endpoint<F, T>
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<T>>
        + Clone
        + Send
        + Sync
        + 'static,
    T: Serialize + Send + 'static,
{
    Endpoint::new(handler)
}

impl<F, T, S> Handler<(RequestContext, ResponseContext), S> for Endpoint<F, T>
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<T>>
        + Clone
        + Send
        + Sync
        + 'static,
    T: Serialize + Send + 'static,
    S: Send + Sync + 'static,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request, _state: S) -> Self::Future {
        Box::pin(async move {
            let mut request = RequestContext::new(req, self.limits);
            let mut response = ResponseContext::new();

            let outcome = (self.handler)(&mut request, &mut response);
            drop(request);

            match resolve(outcome).await {
                Resolved::Success(value) => json_response(&self.translator, value, response),
                Resolved::Stream(streamable) => stream_response(streamable, response),
                Resolved::Failure(failure) => {
                    let (_, headers) = response.into_parts();
                    failure_response(&self.translator, failure, headers)
                }
            }
        })
    }
}

fn json_response<T: Serialize>(
    translator: &ErrorTranslator,
    value: T,
    mut response: ResponseContext,
) -> Response {
    let body = match serde_json::to_vec(&value) {
        Ok(body) => body,
        Err(err) => {
            let (_, headers) = response.into_parts();
            return failure_response(translator, Failure::fault(err), headers);
        }
    };

    response.default_content_type(APPLICATION_JSON);
    let (_, headers) = response.into_parts();
    build_response(StatusCode::OK, headers, Body::from(body))
}

pub(crate) fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Render a failure, then carry over headers the handler or adapter already
/// wrote. Headers set by the translator win.
pub(crate) fn failure_response(
    translator: &ErrorTranslator,
    failure: Failure,
    pending: HeaderMap,
) -> Response {
    tracing::debug!(error = %failure, "request failed");
    let mut response = translator.render(failure);

    let rendered = response.headers().clone();
    for (name, value) in pending.iter() {
        if !rendered.contains_key(name) {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Streamable;
    use axum::{
        Router,
        http::{HeaderValue, header},
        routing::{get, post},
    };
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use rosa_axum_core::Problem;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_value_renders_json_200() {
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::value(serde_json::json!({ "a": 1 }))
            })),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );
        assert_eq!(body_json(response).await, serde_json::json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_existing_content_type_kept() {
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, res: &mut ResponseContext| {
                res.set_header("content-type", "application/geo+json");
                Outcome::value(serde_json::json!({ "type": "FeatureCollection" }))
            })),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/geo+json"
        );
    }

    #[tokio::test]
    async fn test_problem_never_renders_200() {
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::<()>::problem(Problem::new(404.0, "Not Found"))
            })),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "Not Found", "code": 404 })
        );
    }

    #[tokio::test]
    async fn test_absent_renders_empty_response_problem() {
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                None::<Outcome<()>>
            })),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], 500.3);
    }

    #[derive(serde::Deserialize, Serialize)]
    struct Submission {
        name: String,
    }

    #[tokio::test]
    async fn test_deferred_json_body() {
        let app: Router = Router::new().route(
            "/",
            post(endpoint(|req: &mut RequestContext, _: &mut ResponseContext| {
                let body = req.json::<Submission>();
                Outcome::from_future(async move {
                    let submission = body.await?;
                    Ok(serde_json::json!({ "greeting": format!("hello {}", submission.name) }))
                })
            })),
        );

        let ok = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"name":"ana"}"#))
            .unwrap();
        let response = app.clone().oneshot(ok).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["greeting"], "hello ana");

        let bad = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("{oops"))
            .unwrap();
        let response = app.oneshot(bad).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], 400.1);
        assert_eq!(body["details"]["rawLength"], 5);
    }

    #[tokio::test]
    async fn test_failure_keeps_handler_headers() {
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, res: &mut ResponseContext| {
                res.set_header("x-request-id", "abc")
                    .set_header("content-type", "text/csv");
                Outcome::<()>::problem(Problem::new(409.1, "conflict"))
            })),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            HeaderValue::from_static(APPLICATION_JSON)
        );
    }

    #[tokio::test]
    async fn test_fault_routed_to_translator_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let translator = ErrorTranslator::new().debug_hook(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let app: Router = Router::new().route(
            "/",
            get(endpoint(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::<()>::from_future(async {
                    Err(Failure::fault(anyhow::anyhow!("database went away")))
                })
            })
            .translator(translator)),
        );

        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            body_json(response).await["message"],
            "unhandled exception: database went away"
        );
    }

    #[tokio::test]
    async fn test_stream_outcome() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let app: Router = Router::new().route(
            "/export.csv",
            get(endpoint(move |_: &mut RequestContext, res: &mut ResponseContext| {
                let counter = counter.clone();
                res.set_header("content-type", "text/csv");
                let rows: Vec<Result<Bytes, std::io::Error>> =
                    vec![Ok(Bytes::from("id\n")), Ok(Bytes::from("1\n"))];
                Outcome::<()>::stream(Streamable::new(futures::stream::iter(rows)).on_release(
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                ))
            })),
        );

        let response = app.oneshot(get_request("/export.csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/csv");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("id\n1\n"));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
