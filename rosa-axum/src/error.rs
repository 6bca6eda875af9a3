//! The propagated failure value.
//!
//! Classification happens exactly once, where an outcome is resolved or a
//! validation check fails. From then on a [`Failure`] travels as opaque data
//! until the [`ErrorTranslator`](crate::translate::ErrorTranslator) renders it.

use axum::response::{IntoResponse, Response};
use rosa_axum_core::Problem;

use crate::translate::ErrorTranslator;

/// Any error value that can reach the error translator.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// A classified error, rendered as JSON.
    #[error("{0}")]
    Problem(Problem),
    /// A classified error re-tagged to be rendered as an OpenRosa XML envelope.
    #[error("{0}")]
    OpenRosa(Problem),
    /// A request body that could not be decoded.
    #[error("could not parse request body as {format} ({raw_length} bytes)")]
    Malformed {
        format: &'static str,
        raw_length: usize,
    },
    /// An unclassified runtime fault.
    #[error("{0}")]
    Fault(anyhow::Error),
}

impl Failure {
    /// Wrap an unclassified fault.
    pub fn fault<E: Into<anyhow::Error>>(err: E) -> Self {
        Failure::Fault(err.into())
    }

    /// Tag a classified failure for OpenRosa rendering.
    ///
    /// Malformed bodies are classified first. Unclassified faults are left
    /// untouched and keep rendering through the generic 500 branch.
    pub fn for_open_rosa(self) -> Self {
        match self {
            Failure::Problem(problem) => Failure::OpenRosa(problem),
            Failure::Malformed { format, raw_length } => {
                Failure::OpenRosa(Problem::unparseable(format, raw_length))
            }
            other => other,
        }
    }

    /// The classified error carried by this failure, if any.
    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Failure::Problem(problem) | Failure::OpenRosa(problem) => Some(problem),
            _ => None,
        }
    }

    pub fn is_open_rosa(&self) -> bool {
        matches!(self, Failure::OpenRosa(_))
    }
}

impl From<Problem> for Failure {
    fn from(problem: Problem) -> Self {
        Failure::Problem(problem)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Fault(err)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        // Adapters carry their own translator; this is the fallback for
        // failures returned from plain axum handlers.
        ErrorTranslator::default().render(self)
    }
}
