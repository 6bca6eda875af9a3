//! Shared adapter configuration.
//!
//! [`Adapters`] holds the settings every endpoint on a router should agree on
//! (the error translator and body limits) and stamps them onto each adapted
//! handler, so all routes funnel failures through the same translator.
//!
//! ```rust,no_run
//! use axum::{Router, http::StatusCode, routing::{get, post}};
//! use rosa_axum::prelude::*;
//!
//! let adapters = Adapters::from_env().limits(BodyLimits::new(1024 * 1024));
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/v1/users/current",
//!         get(adapters.endpoint(|_req: &mut RequestContext, _res: &mut ResponseContext| {
//!             Outcome::value(serde_json::json!({ "id": 1 }))
//!         })),
//!     )
//!     .route(
//!         "/v1/projects/1/submission",
//!         post(adapters.open_rosa(|_req: &mut RequestContext, _res: &mut ResponseContext| {
//!             Outcome::value(OpenRosaReply::new(StatusCode::CREATED, "<ok/>"))
//!         })),
//!     );
//! ```

use serde::Serialize;

use crate::context::{BodyLimits, RequestContext, ResponseContext};
use crate::handler::Endpoint;
use crate::openrosa::{OpenRosaEndpoint, OpenRosaReply};
use crate::outcome::Outcome;
use crate::translate::ErrorTranslator;

/// Builder for adapters sharing one translator and one set of limits.
#[derive(Clone, Debug, Default)]
pub struct Adapters {
    translator: ErrorTranslator,
    limits: BodyLimits,
}

impl Adapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapters whose translator is configured from the environment.
    ///
    /// See [`ErrorTranslator::from_env`].
    pub fn from_env() -> Self {
        Self::new().translator(ErrorTranslator::from_env())
    }

    pub fn translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    pub fn limits(mut self, limits: BodyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn error_translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    /// Adapt a handler to the JSON protocol.
    pub fn endpoint<F, T>(&self, handler: F) -> Endpoint<F, T>
    where
        F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<T>>
            + Clone
            + Send
            + Sync
            + 'static,
        T: Serialize + Send + 'static,
    {
        Endpoint::new(handler)
            .translator(self.translator.clone())
            .limits(self.limits)
    }

    /// Adapt a handler to the OpenRosa protocol.
    pub fn open_rosa<F>(&self, handler: F) -> OpenRosaEndpoint<F>
    where
        F: Fn(&mut RequestContext, &mut ResponseContext) -> Option<Outcome<OpenRosaReply>>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        OpenRosaEndpoint::new(handler)
            .translator(self.translator.clone())
            .limits(self.limits)
    }
}
