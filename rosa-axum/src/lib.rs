//! # rosa-axum
//!
//! Adapters between route handlers and an [axum](https://github.com/tokio-rs/axum)
//! server that turn whatever a handler produces into exactly one HTTP response.
//!
//! A handler returns an [`Outcome`]: a plain value, a classified [`Problem`],
//! a streaming body, or asynchronous work ([`Deferred`], [`LazyUnit`]). The
//! [resolver](resolve::resolve) reduces it to a single success or failure, and the
//! adapter renders it for its wire protocol:
//!
//! - [`Endpoint`]: JSON API routes.
//! - [`OpenRosaEndpoint`]: OpenRosa form-submission routes, with mandatory
//!   headers, request header validation and XML bodies.
//!
//! Every failure from either adapter goes through one [`ErrorTranslator`],
//! which picks XML or JSON rendering from the failure itself.
//!
//! ## Layout
//!
//! ```text
//! handler ──▶ Outcome ──▶ resolve ──┬──▶ success ──▶ JSON / XML / stream
//!                                   └──▶ Failure ──▶ ErrorTranslator
//! ```

pub mod adapters;
pub mod context;
pub mod error;
pub mod handler;
pub mod openrosa;
pub mod outcome;
pub mod resolve;
pub mod stream_response;
pub mod translate;

pub use adapters::Adapters;
pub use context::{BodyLimits, RequestContext, ResponseContext};
pub use error::Failure;
pub use handler::{Endpoint, endpoint};
pub use openrosa::{OpenRosaEndpoint, OpenRosaReply, open_rosa};
pub use outcome::{Deferred, LazyUnit, Outcome, Streamable};
pub use resolve::{Resolved, resolve};
pub use translate::ErrorTranslator;

// Re-export the core types
pub use rosa_axum_core::{Nature, OpenRosaMessage, Problem};

pub mod prelude {
    //! A prelude for `rosa-axum` providing the most common types.
    pub use crate::adapters::Adapters;
    pub use crate::context::{BodyLimits, RequestContext, ResponseContext};
    pub use crate::error::Failure;
    pub use crate::handler::endpoint;
    pub use crate::openrosa::{OpenRosaReply, open_rosa};
    pub use crate::outcome::{Deferred, Outcome, Streamable};
    pub use crate::translate::ErrorTranslator;
    pub use rosa_axum_core::{OpenRosaMessage, Problem};
}
