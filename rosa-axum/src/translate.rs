//! Rendering failures into wire-format error responses.
//!
//! Every failure, whichever adapter produced it, is rendered here exactly
//! once. The branch is picked in priority order:
//!
//! 1. [`Failure::OpenRosa`]: XML envelope with `nature="error"`.
//! 2. [`Failure::Problem`]: JSON `{message, code, details?}`.
//! 3. [`Failure::Malformed`]: re-entered as an unparseable [`Problem`].
//! 4. [`Failure::Fault`]: 500 JSON, logged and passed to the debug hook.
//!
//! The OpenRosa check must come first: the same classified error renders
//! differently depending on which adapter produced it.

use std::backtrace::BacktraceStatus;
use std::fmt;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use rosa_axum_core::{OpenRosaMessage, Problem};
use serde::Serialize;

use crate::error::Failure;

/// Environment variable enabling stack lines in unhandled-fault responses.
pub const EXPOSE_STACK_ENV: &str = "ROSA_EXPOSE_STACK";

pub(crate) const TEXT_XML: &str = "text/xml; charset=utf-8";

/// Hook invoked with every unclassified fault, e.g. to break into a debugger.
pub type DebugHook = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// Renders [`Failure`] values into HTTP responses.
///
/// Cheap to clone; adapters each hold a copy.
///
/// # Example
///
/// ```rust
/// use rosa_axum::ErrorTranslator;
///
/// let translator = ErrorTranslator::new()
///     .expose_stack(false)
///     .debug_hook(|err| eprintln!("fault: {err:?}"));
/// ```
#[derive(Clone, Default)]
pub struct ErrorTranslator {
    expose_stack: bool,
    debug_hook: Option<DebugHook>,
}

impl fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("expose_stack", &self.expose_stack)
            .field("debug_hook", &self.debug_hook.is_some())
            .finish()
    }
}

impl ErrorTranslator {
    /// Create a translator that hides stack lines and has no debug hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a translator configured from the environment.
    ///
    /// Stack lines are exposed when `ROSA_EXPOSE_STACK` is `1` or `true`.
    pub fn from_env() -> Self {
        let expose = std::env::var(EXPOSE_STACK_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        Self::new().expose_stack(expose)
    }

    /// Include captured backtrace lines in unhandled-fault responses.
    pub fn expose_stack(mut self, expose: bool) -> Self {
        self.expose_stack = expose;
        self
    }

    /// Set the hook invoked with every unclassified fault.
    pub fn debug_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&anyhow::Error) + Send + Sync + 'static,
    {
        self.debug_hook = Some(Arc::new(hook));
        self
    }

    /// Render a failure into exactly one response.
    pub fn render(&self, failure: Failure) -> Response {
        match failure {
            Failure::OpenRosa(problem) => open_rosa_error_response(&problem),
            Failure::Problem(problem) => problem_response(problem),
            Failure::Malformed { format, raw_length } => {
                tracing::debug!(format, raw_length, "request body could not be parsed");
                self.render(Failure::Problem(Problem::unparseable(format, raw_length)))
            }
            Failure::Fault(err) => self.fault_response(err),
        }
    }

    fn fault_response(&self, err: anyhow::Error) -> Response {
        tracing::error!(error = %err, detail = ?err, "unhandled exception");
        if let Some(hook) = &self.debug_hook {
            hook(&err);
        }

        let stack = if self.expose_stack {
            stack_lines(&err)
        } else {
            None
        };
        let body = FaultBody {
            message: format!("unhandled exception: {err}"),
            details: stack.map(|stack| FaultDetails { stack }),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct FaultBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FaultDetails>,
}

#[derive(Serialize)]
struct FaultDetails {
    stack: Vec<String>,
}

fn problem_response(problem: Problem) -> Response {
    (problem.status(), Json(problem)).into_response()
}

fn open_rosa_error_response(problem: &Problem) -> Response {
    let body = OpenRosaMessage::error(problem.message()).render();
    Response::builder()
        .status(problem.status())
        .header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_XML))
        .body(Body::from(body))
        .unwrap_or_else(|_| internal_error_response())
}

/// Trimmed backtrace lines, when one was actually captured.
fn stack_lines(err: &anyhow::Error) -> Option<Vec<String>> {
    let backtrace = err.backtrace();
    if backtrace.status() != BacktraceStatus::Captured {
        return None;
    }
    Some(
        backtrace
            .to_string()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

/// Last-resort response when building a proper one failed.
pub(crate) fn internal_error_response() -> Response {
    let mut response = Response::new(Body::from(
        r#"{"message":"An unknown internal problem has occurred.","code":500.1}"#,
    ));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_open_rosa_branch_renders_xml() {
        let failure = Failure::OpenRosa(Problem::new(400.0, "bad"));
        let response = ErrorTranslator::new().render(failure);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            TEXT_XML
        );
        let body = body_string(response).await;
        assert!(body.contains("nature=\"error\""));
        assert!(body.contains(">bad</message>"));
    }

    #[tokio::test]
    async fn test_problem_branch_renders_json() {
        let problem = Problem::new(409.1, "conflict").with_details(serde_json::json!({ "x": 1 }));
        let response = ErrorTranslator::new().render(Failure::Problem(problem));

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "conflict", "code": 409.1, "details": { "x": 1 } })
        );
    }

    #[tokio::test]
    async fn test_malformed_branch_becomes_unparseable_problem() {
        let failure = Failure::Malformed {
            format: "json",
            raw_length: 42,
        };
        let response = ErrorTranslator::new().render(failure);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], 400.1);
        assert_eq!(body["details"]["rawLength"], 42);
        assert_eq!(body["details"]["format"], "json");
    }

    #[tokio::test]
    async fn test_fault_branch_renders_500_and_calls_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let translator = ErrorTranslator::new().debug_hook(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let response = translator.render(Failure::fault(anyhow::anyhow!("disk on fire")));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let body = body_json(response).await;
        assert_eq!(body["message"], "unhandled exception: disk on fire");
        assert!(body.get("code").is_none());
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_fault_stack_hidden_unless_exposed() {
        // Whether a backtrace is captured depends on RUST_BACKTRACE; when it is,
        // only an exposing translator may show it.
        let hidden = ErrorTranslator::new().render(Failure::fault(anyhow::anyhow!("x")));
        assert!(body_json(hidden).await.get("details").is_none());

        let err = anyhow::anyhow!("y");
        let captured = err.backtrace().status() == BacktraceStatus::Captured;
        let shown = ErrorTranslator::new().expose_stack(true).render(Failure::Fault(err));
        let body = body_json(shown).await;
        assert_eq!(body["details"]["stack"].is_array(), captured);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag(""));
    }

    #[tokio::test]
    async fn test_failure_into_response_uses_default_translator() {
        let response = Failure::from(Problem::not_found()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], 404.1);
    }
}
