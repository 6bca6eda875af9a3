//! Core protocol types for rosa-axum.
//!
//! This crate provides the shared types used by the adapter layer
//! (`rosa-axum`) and by anything else that needs to speak the same error
//! vocabulary.
//!
//! ## Modules
//!
//! - [`problem`]: Classified errors and their factory constructors
//! - [`envelope`]: OpenRosa XML response envelopes

mod envelope;
mod problem;

pub use envelope::*;
pub use problem::*;
