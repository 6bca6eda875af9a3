//! Reducing a handler outcome to one terminal action.
//!
//! Classification runs in a fixed order:
//!
//! 1. absent (`None`) → failure with [`Problem::empty_response`]
//! 2. [`Outcome::Stream`] → stream it, nothing further to resolve
//! 3. [`Outcome::Lazy`] → invoke once, continue with the [`Deferred`] it yields
//! 4. [`Outcome::Deferred`] → await; a resolved value is classified again from
//!    step 1, a rejection becomes the failure as-is
//! 5. [`Outcome::Problem`] → failure
//! 6. [`Outcome::Value`] → success
//!
//! The result is a single [`Resolved`] value, so a request can never see both
//! a success and a failure, or neither.
//!
//! [`Deferred`]: crate::outcome::Deferred

use rosa_axum_core::Problem;

use crate::error::Failure;
use crate::outcome::{Outcome, Streamable};

/// The terminal action for one request.
#[derive(Debug)]
pub enum Resolved<T> {
    Success(T),
    Stream(Streamable),
    Failure(Failure),
}

impl<T> Resolved<T> {
    /// Hand the terminal action to exactly one continuation.
    pub fn fold<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_stream: impl FnOnce(Streamable) -> R,
        on_failure: impl FnOnce(Failure) -> R,
    ) -> R {
        match self {
            Resolved::Success(value) => on_success(value),
            Resolved::Stream(streamable) => on_stream(streamable),
            Resolved::Failure(failure) => on_failure(failure),
        }
    }
}

/// Resolve an outcome.
///
/// Non-streaming deferred work is not cancelled when the client goes away; it
/// runs to completion and its result is discarded with the connection.
pub async fn resolve<T>(outcome: Option<Outcome<T>>) -> Resolved<T> {
    let mut next = outcome;
    loop {
        match next {
            None => {
                tracing::trace!("handler produced no result");
                return Resolved::Failure(Failure::Problem(Problem::empty_response()));
            }
            Some(Outcome::Stream(streamable)) => {
                tracing::trace!("resolved to stream");
                return Resolved::Stream(streamable);
            }
            Some(Outcome::Lazy(unit)) => {
                tracing::trace!("invoking lazy unit");
                next = Some(Outcome::Deferred(unit.invoke()));
            }
            Some(Outcome::Deferred(deferred)) => match deferred.into_future().await {
                Ok(resolved) => next = resolved,
                Err(rejection) => {
                    tracing::trace!("deferred rejected");
                    return Resolved::Failure(rejection);
                }
            },
            Some(Outcome::Problem(problem)) => {
                tracing::trace!(code = problem.code(), "resolved to problem");
                return Resolved::Failure(Failure::Problem(problem));
            }
            Some(Outcome::Value(value)) => return Resolved::Success(value),
        }
    }
}
