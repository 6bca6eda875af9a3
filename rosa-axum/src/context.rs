//! Per-request state handed to handlers.
//!
//! - [`RequestContext`]: the request head plus the not-yet-read body.
//! - [`ResponseContext`]: status and headers written before the terminal
//!   response is built.

pub mod limit;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header,
        request::Parts,
    },
};
use futures::future::BoxFuture;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use rosa_axum_core::Problem;
use serde::de::DeserializeOwned;

use crate::error::Failure;

pub use limit::{BodyLimits, DEFAULT_MAX_BODY_SIZE};

/// The live request as seen by a handler.
#[derive(Debug)]
pub struct RequestContext {
    parts: Parts,
    body: Option<Body>,
    limits: BodyLimits,
}

impl RequestContext {
    pub fn new(req: Request, limits: BodyLimits) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body: Some(body),
            limits,
        }
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Take the raw body. Returns `None` once it has been taken.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Read the whole body, enforcing the configured size limit.
    ///
    /// The returned future owns the body, so it can be moved into a
    /// [`Deferred`](crate::outcome::Deferred).
    pub fn bytes(&mut self) -> BoxFuture<'static, Result<Bytes, Failure>> {
        let body = self.body.take();
        let limits = self.limits;
        let declared = self
            .parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());

        Box::pin(async move {
            let Some(body) = body else {
                return Err(Failure::fault(anyhow::anyhow!(
                    "request body was already consumed"
                )));
            };
            if let Some(declared) = declared {
                limits.check_size(declared)?;
            }
            read_body(body, limits).await
        })
    }

    /// Read and decode the body as JSON.
    ///
    /// A body that does not decode becomes [`Failure::Malformed`].
    pub fn json<T>(&mut self) -> BoxFuture<'static, Result<T, Failure>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let bytes = self.bytes();
        Box::pin(async move {
            let bytes = bytes.await?;
            serde_json::from_slice(&bytes).map_err(|err| {
                tracing::debug!(error = %err, raw_length = bytes.len(), "malformed json body");
                Failure::Malformed {
                    format: "json",
                    raw_length: bytes.len(),
                }
            })
        })
    }
}

async fn read_body(body: Body, limits: BodyLimits) -> Result<Bytes, Failure> {
    match limits.max_body_size() {
        Some(max) => match Limited::new(body, max).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.is::<LengthLimitError>() => {
                Err(Failure::from(Problem::payload_too_large(max)))
            }
            Err(err) => Err(Failure::Fault(anyhow::anyhow!(err))),
        },
        None => Ok(body.collect().await.map_err(Failure::fault)?.to_bytes()),
    }
}

/// Status and headers written ahead of the terminal response.
#[derive(Debug, Default)]
pub struct ResponseContext {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl ResponseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any previous value.
    ///
    /// Invalid names or values are dropped and logged.
    pub fn set_header<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key_str = key.as_ref();
        let val_str = value.as_ref();

        match HeaderName::from_bytes(key_str.as_bytes()) {
            Ok(name) => match HeaderValue::from_str(val_str) {
                Ok(val) => {
                    self.headers.insert(name, val);
                }
                Err(e) => {
                    tracing::debug!(
                        key = key_str,
                        value = val_str,
                        error = %e,
                        "invalid header value, header dropped"
                    );
                }
            },
            Err(e) => {
                tracing::debug!(key = key_str, error = %e, "invalid header name, header dropped");
            }
        }
        self
    }

    pub fn has_content_type(&self) -> bool {
        self.headers.contains_key(header::CONTENT_TYPE)
    }

    /// Set `Content-Type` only when none is set yet.
    pub(crate) fn default_content_type(&mut self, content_type: &'static str) {
        if !self.has_content_type() {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    pub(crate) fn into_parts(self) -> (Option<StatusCode>, HeaderMap) {
        (self.status, self.headers)
    }
}
