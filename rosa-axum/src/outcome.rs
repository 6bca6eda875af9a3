//! What a handler hands back.
//!
//! An [`Outcome`] is decided by the producer. The resolver never probes a
//! value for capabilities, it only matches on the variant.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use rosa_axum_core::Problem;

use crate::error::Failure;

/// Error type carried by streaming bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result of invoking a handler.
///
/// Handlers return `Option<Outcome<T>>`; `None` means no value was produced.
pub enum Outcome<T> {
    /// Plain data, serialized by the adapter.
    Value(T),
    /// A classified error.
    Problem(Problem),
    /// A body written incrementally to the response.
    Stream(Streamable),
    /// A computation started only when the outcome is resolved.
    Lazy(LazyUnit<T>),
    /// An asynchronous computation already in flight.
    Deferred(Deferred<T>),
}

impl<T> Outcome<T> {
    pub fn value(value: T) -> Option<Self> {
        Some(Outcome::Value(value))
    }

    pub fn problem(problem: Problem) -> Option<Self> {
        Some(Outcome::Problem(problem))
    }

    pub fn stream(streamable: Streamable) -> Option<Self> {
        Some(Outcome::Stream(streamable))
    }

    /// A future whose resolved outcome is classified again.
    pub fn deferred<F>(future: F) -> Option<Self>
    where
        F: Future<Output = Result<Option<Outcome<T>>, Failure>> + Send + 'static,
    {
        Some(Outcome::Deferred(Deferred::new(future)))
    }

    /// A thunk invoked once, when resolution reaches it.
    pub fn lazy<F>(thunk: F) -> Option<Self>
    where
        F: FnOnce() -> Deferred<T> + Send + 'static,
    {
        Some(Outcome::Lazy(LazyUnit::new(thunk)))
    }

    fn kind(&self) -> &'static str {
        match self {
            Outcome::Value(_) => "value",
            Outcome::Problem(_) => "problem",
            Outcome::Stream(_) => "stream",
            Outcome::Lazy(_) => "lazy",
            Outcome::Deferred(_) => "deferred",
        }
    }
}

impl<T: Send + 'static> Outcome<T> {
    /// A future producing a plain value or a failure.
    pub fn from_future<F>(future: F) -> Option<Self>
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        Self::deferred(future.map(|result| result.map(Outcome::value)))
    }
}

impl<T> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Outcome::{}", self.kind())
    }
}

impl<T> From<Problem> for Outcome<T> {
    fn from(problem: Problem) -> Self {
        Outcome::Problem(problem)
    }
}

impl<T> From<Streamable> for Outcome<T> {
    fn from(streamable: Streamable) -> Self {
        Outcome::Stream(streamable)
    }
}

impl<T> From<Deferred<T>> for Outcome<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Outcome::Deferred(deferred)
    }
}

/// An asynchronous computation.
///
/// Resolving to `Ok` re-enters classification; `Err` is a rejection and is
/// passed on as-is.
pub struct Deferred<T>(BoxFuture<'static, Result<Option<Outcome<T>>, Failure>>);

impl<T> Deferred<T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Option<Outcome<T>>, Failure>> + Send + 'static,
    {
        Self(Box::pin(future))
    }

    pub(crate) fn into_future(self) -> BoxFuture<'static, Result<Option<Outcome<T>>, Failure>> {
        self.0
    }
}

/// A zero-argument thunk yielding a [`Deferred`].
pub struct LazyUnit<T>(Box<dyn FnOnce() -> Deferred<T> + Send>);

impl<T> LazyUnit<T> {
    pub fn new<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Deferred<T> + Send + 'static,
    {
        Self(Box::new(thunk))
    }

    /// Run the thunk. Consumes the unit, so it runs at most once.
    pub fn invoke(self) -> Deferred<T> {
        (self.0)()
    }
}

/// A body written incrementally, with an optional release hook.
///
/// The hook fires once, when the stream finishes or when the client goes
/// away first.
pub struct Streamable {
    stream: BoxStream<'static, Result<Bytes, BoxError>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Streamable {
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            stream: stream.map(|chunk| chunk.map_err(Into::into)).boxed(),
            release: None,
        }
    }

    /// Set the hook releasing whatever backs the stream.
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BoxStream<'static, Result<Bytes, BoxError>>,
        Option<Box<dyn FnOnce() + Send>>,
    ) {
        (self.stream, self.release)
    }
}

impl fmt::Debug for Streamable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Streamable")
            .field("release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_names_variant() {
        let outcome: Outcome<u8> = Problem::not_found().into();
        assert_eq!(format!("{outcome:?}"), "Outcome::problem");

        let outcome = Outcome::<u8>::lazy(|| Deferred::new(async { Ok(None) }));
        assert_eq!(format!("{:?}", outcome.unwrap()), "Outcome::lazy");
    }

    #[test]
    fn test_streamable_debug_reports_release() {
        let streamable =
            Streamable::new(futures::stream::empty::<Result<Bytes, std::io::Error>>());
        assert!(format!("{streamable:?}").contains("release: false"));

        let streamable = streamable.on_release(|| {});
        assert!(format!("{streamable:?}").contains("release: true"));
    }
}
