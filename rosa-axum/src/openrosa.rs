//! The OpenRosa endpoint adapter.
//!
//! OpenRosa is the form-submission protocol spoken by data collection
//! clients. Compared to the JSON adapter, [`OpenRosaEndpoint`]:
//!
//! - writes the mandatory OpenRosa response headers before anything else, so
//!   rejected requests stay protocol-compliant
//! - rejects requests with a wrong `X-OpenRosa-Version` or an unreadable
//!   `Date` before the handler runs
//! - sends the handler's pre-rendered XML body and status verbatim
//! - tags classified failures so they render as XML envelopes
//!
//! ```rust,no_run
//! use axum::{Router, http::StatusCode, routing::head};
//! use rosa_axum::prelude::*;
//!
//! let app: Router = Router::new().route(
//!     "/v1/projects/1/submission",
//!     head(open_rosa(|_req: &mut RequestContext, _res: &mut ResponseContext| {
//!         Outcome::value(OpenRosaReply::new(StatusCode::NO_CONTENT, ""))
//!     })),
//! );
//! ```

pub mod headers;

use std::future::Future;
use std::pin::Pin;

use axum::{
    body::Body,
    extract::Request,
    handler::Handler,
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use rosa_axum_core::OpenRosaMessage;

use crate::context::{BodyLimits, RequestContext, ResponseContext};
use crate::error::Failure;
use crate::handler::{build_response, failure_response};
use crate::outcome::Outcome;
use crate::resolve::{Resolved, resolve};
use crate::stream_response::stream_response;
use crate::translate::{ErrorTranslator, TEXT_XML};

pub use headers::{
    OPENROSA_ACCEPT_CONTENT_LENGTH, OPENROSA_ACCEPT_CONTENT_LENGTH_HEADER,
    OPENROSA_CONTENT_LANGUAGE, OPENROSA_VERSION, OPENROSA_VERSION_HEADER,
};

/// A successful OpenRosa result: a status and an already rendered XML body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRosaReply {
    status: StatusCode,
    body: String,
}

impl OpenRosaReply {
    pub fn new<S: Into<String>>(status: StatusCode, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A reply carrying a single-message envelope.
    pub fn message(status: StatusCode, message: &OpenRosaMessage) -> Self {
        Self::new(status, message.render())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A handler adapted to the OpenRosa protocol.
#[derive(Clone)]
pub struct OpenRosaEndpoint<F> {
    handler: F,
    translator: ErrorTranslator,
    limits: BodyLimits,
}

impl<F> OpenRosaEndpoint<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            translator: ErrorTranslator::default(),
            limits: BodyLimits::default(),
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

/// Adapt a handler to the OpenRosa protocol with default settings.
pub fn open_rosa<F>(handler: F) -> OpenRosaEndpoint<F>
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<OpenRosaReply>>
        + Clone
        + Send
        + Sync
        + 'static,
{
    OpenRosaEndpoint::new(handler)
}

impl<F, S> Handler<(RequestContext, ResponseContext), S> for OpenRosaEndpoint<F>
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<OpenRosaReply>>
        + Clone
        + Send
        + Sync
        + 'static,
    S: Send + Sync + 'static,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request, _state: S) -> Self::Future {
        Box::pin(async move {
            let mut response = ResponseContext::new();
            headers::set_response_headers(&mut response, Utc::now());

            let mut request = RequestContext::new(req, self.limits);
            if let Err(problem) = headers::validate_request(request.headers()) {
                tracing::debug!(error = %problem, "rejecting openrosa request");
                let (_, pending) = response.into_parts();
                return failure_response(
                    &self.translator,
                    Failure::from(problem).for_open_rosa(),
                    pending,
                );
            }

            let outcome = (self.handler)(&mut request, &mut response);
            drop(request);

            match resolve(outcome).await {
                Resolved::Success(reply) => {
                    response.default_content_type(TEXT_XML);
                    let (_, pending) = response.into_parts();
                    build_response(reply.status, pending, Body::from(reply.body))
                }
                Resolved::Stream(streamable) => stream_response(streamable, response),
                Resolved::Failure(failure) => {
                    let (_, pending) = response.into_parts();
                    failure_response(&self.translator, failure.for_open_rosa(), pending)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::header,
        routing::{get, post},
    };
    use http_body_util::BodyExt;
    use rosa_axum_core::Problem;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    const VALID_DATE: &str = "Tue, 01 Jan 2030 00:00:00 GMT";

    fn form_list(_: &mut RequestContext, _: &mut ResponseContext) -> Option<Outcome<OpenRosaReply>> {
        Outcome::value(OpenRosaReply::new(
            StatusCode::OK,
            "<xforms xmlns=\"http://openrosa.org/xforms/xformsList\"/>",
        ))
    }

    fn request(version: Option<&str>, date: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/formList");
        if let Some(version) = version {
            builder = builder.header(OPENROSA_VERSION_HEADER, version);
        }
        if let Some(date) = date {
            builder = builder.header(header::DATE, date);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn assert_openrosa_headers(response: &Response) {
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_LANGUAGE).unwrap(), "en");
        assert_eq!(headers.get(OPENROSA_VERSION_HEADER).unwrap(), "1.0");
        assert_eq!(
            headers.get(OPENROSA_ACCEPT_CONTENT_LENGTH_HEADER).unwrap(),
            "20000000"
        );
        assert!(headers.get(header::DATE).unwrap().to_str().unwrap().ends_with(" GMT"));
    }

    #[tokio::test]
    async fn test_success_sends_reply_verbatim() {
        let app: Router = Router::new().route("/formList", get(open_rosa(form_list)));

        let response = app
            .oneshot(request(Some("1.0"), Some(VALID_DATE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_openrosa_headers(&response);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), TEXT_XML);
        assert_eq!(
            body_string(response).await,
            "<xforms xmlns=\"http://openrosa.org/xforms/xformsList\"/>"
        );
    }

    #[tokio::test]
    async fn test_missing_version_rejected_before_handler() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();
        let app: Router = Router::new().route(
            "/formList",
            get(open_rosa(move |req: &mut RequestContext, res: &mut ResponseContext| {
                flag.store(true, Ordering::SeqCst);
                form_list(req, res)
            })),
        );

        let response = app.oneshot(request(None, Some(VALID_DATE))).await.unwrap();

        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_openrosa_headers(&response);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), TEXT_XML);
        let body = body_string(response).await;
        assert!(body.contains("nature=\"error\""));
        assert!(body.contains("X-OpenRosa-Version"));
    }

    #[tokio::test]
    async fn test_bad_date_rejected() {
        let app: Router = Router::new().route("/formList", get(open_rosa(form_list)));

        let response = app
            .oneshot(request(Some("1.0"), Some("31/12/2029")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("(Date)"));
        assert!(body.contains("31/12/2029"));
    }

    #[tokio::test]
    async fn test_offset_date_accepted() {
        let app: Router = Router::new().route("/formList", get(open_rosa(form_list)));

        let response = app
            .oneshot(request(Some("1.0"), Some("Tue, 01 Jan 2030 00:00:00 GMT+0500")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mismatched_weekday_accepted() {
        let app: Router = Router::new().route("/formList", get(open_rosa(form_list)));

        let response = app
            .oneshot(request(Some("1.0"), Some("Mon, 01 Jan 2030 00:00:00 GMT")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_handler_problem_renders_xml() {
        let app: Router = Router::new().route(
            "/submission",
            post(open_rosa(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::problem(Problem::new(409.0, "A submission already exists with this ID."))
            })),
        );

        let mut req = request(Some("1.0"), Some(VALID_DATE));
        *req.method_mut() = axum::http::Method::POST;
        *req.uri_mut() = "/submission".parse().unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_openrosa_headers(&response);
        let body = body_string(response).await;
        assert!(body.contains("<message nature=\"error\">A submission already exists with this ID.</message>"));
    }

    #[tokio::test]
    async fn test_deferred_reply_with_custom_status() {
        let app: Router = Router::new().route(
            "/submission",
            post(open_rosa(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::from_future(async {
                    Ok(OpenRosaReply::message(
                        StatusCode::CREATED,
                        &OpenRosaMessage::success("full submission upload was successful!"),
                    ))
                })
            })),
        );

        let mut req = request(Some("1.0"), Some(VALID_DATE));
        *req.method_mut() = axum::http::Method::POST;
        *req.uri_mut() = "/submission".parse().unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_string(response).await.contains("nature=\"success\""));
    }

    #[tokio::test]
    async fn test_fault_stays_json_500() {
        let app: Router = Router::new().route(
            "/formList",
            get(open_rosa(|_: &mut RequestContext, _: &mut ResponseContext| {
                Outcome::from_future(async { Err(Failure::fault(anyhow::anyhow!("boom"))) })
            })),
        );

        let response = app
            .oneshot(request(Some("1.0"), Some(VALID_DATE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_openrosa_headers(&response);
    }
}
