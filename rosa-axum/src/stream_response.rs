//! Streaming response bodies.
//!
//! A [`Streamable`] is written to the client as it produces chunks. The
//! server drops the body when the client disconnects, so the release hook is
//! tied to the body: it runs when the stream ends or when the body is dropped,
//! whichever comes first, and never twice.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::StatusCode,
    response::Response,
};
use futures::Stream;
use pin_project_lite::pin_project;

use crate::context::ResponseContext;
use crate::outcome::Streamable;

type Release = Box<dyn FnOnce() + Send>;

pin_project! {
    /// A stream that runs a release hook exactly once.
    pub struct ReleaseOnClose<S> {
        #[pin]
        stream: S,
        release: Option<Release>,
    }

    impl<S> PinnedDrop for ReleaseOnClose<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(release) = this.release.take() {
                tracing::debug!("response body dropped before completion, releasing stream");
                release();
            }
        }
    }
}

impl<S> ReleaseOnClose<S> {
    pub fn new(stream: S, release: Option<Release>) -> Self {
        Self { stream, release }
    }
}

impl<S: Stream> Stream for ReleaseOnClose<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let next = this.stream.poll_next(cx);
        if let Poll::Ready(None) = next {
            if let Some(release) = this.release.take() {
                tracing::trace!("stream completed, releasing");
                release();
            }
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

/// Build the response for a streaming outcome.
///
/// Status and headers come from the response context, defaulting to 200.
pub(crate) fn stream_response(streamable: Streamable, response: ResponseContext) -> Response {
    let (stream, release) = streamable.into_parts();
    let (status, headers) = response.into_parts();

    let mut out = Response::new(Body::from_stream(ReleaseOnClose::new(stream, release)));
    *out.status_mut() = status.unwrap_or(StatusCode::OK);
    *out.headers_mut() = headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::StreamExt;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_release(counter: &Arc<AtomicUsize>) -> Option<Release> {
        let counter = counter.clone();
        Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test]
    async fn test_release_once_on_completion() {
        let released = Arc::new(AtomicUsize::new(0));
        let stream = futures::stream::iter(vec![1, 2, 3]);
        let mut wrapped = ReleaseOnClose::new(stream, counting_release(&released));

        let mut seen = Vec::new();
        while let Some(item) = wrapped.next().await {
            assert_eq!(released.load(Ordering::SeqCst), 0);
            seen.push(item);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(released.load(Ordering::SeqCst), 1);

        // Polling past the end and dropping must not release again.
        assert!(wrapped.next().await.is_none());
        drop(wrapped);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_once_on_early_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let stream = futures::stream::iter(vec![1, 2, 3]);
        let mut wrapped = ReleaseOnClose::new(stream, counting_release(&released));

        assert_eq!(wrapped.next().await, Some(1));
        drop(wrapped);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_release_hook() {
        let wrapped = ReleaseOnClose::new(futures::stream::iter(vec![1]), None);
        assert_eq!(wrapped.collect::<Vec<_>>().await, vec![1]);
    }

    #[tokio::test]
    async fn test_stream_response_status_and_body() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("a,b\n")), Ok(Bytes::from("1,2\n"))];
        let streamable = Streamable::new(futures::stream::iter(chunks)).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut ctx = ResponseContext::new();
        ctx.set_header("content-type", "text/csv");

        let response = stream_response(streamable, ctx);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/csv");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("a,b\n1,2\n"));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
