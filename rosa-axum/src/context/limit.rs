//! Request body size limits.
//!
//! The default matches the `X-OpenRosa-Accept-Content-Length` value advertised
//! to OpenRosa clients, so JSON and OpenRosa routes accept the same body size.

use rosa_axum_core::Problem;

/// Default maximum request body size (20 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 20_000_000;

/// Configuration for request body size limits.
///
/// # Example
///
/// ```rust
/// use rosa_axum::BodyLimits;
///
/// // Use the default 20 MB limit
/// let limits = BodyLimits::default();
///
/// // Custom 1 MB limit
/// let limits = BodyLimits::new(1024 * 1024);
///
/// // No limit (not recommended for production)
/// let limits = BodyLimits::unlimited();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyLimits {
    /// `None` means unlimited.
    max_body_size: Option<usize>,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_body_size: Some(DEFAULT_MAX_BODY_SIZE),
        }
    }
}

impl BodyLimits {
    pub fn new(max_body_size: usize) -> Self {
        Self {
            max_body_size: Some(max_body_size),
        }
    }

    /// Create limits with no maximum.
    ///
    /// # Security Warning
    ///
    /// Unlimited bodies let a client exhaust server memory. Only use this in
    /// trusted environments.
    pub fn unlimited() -> Self {
        Self {
            max_body_size: None,
        }
    }

    pub fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }

    /// Check a body size against the limit.
    pub fn check_size(&self, size: usize) -> Result<(), Problem> {
        match self.max_body_size {
            Some(max) if size > max => Err(Problem::payload_too_large(max)),
            _ => Ok(()),
        }
    }
}
