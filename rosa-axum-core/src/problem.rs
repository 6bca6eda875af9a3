//! Classified errors.
//!
//! A [`Problem`] is a domain error that already knows how it should be
//! reported: an HTTP status, a human readable message, a machine readable
//! problem code and optional structured details. Problems are immutable once
//! built; the factory constructors below cover the kinds the adapter layer
//! itself has to produce.
//!
//! # Wire Format
//!
//! Problems serialize as the JSON error body:
//! ```json
//! {"message": "conflict", "code": 409.1, "details": {"x": 1}}
//! ```

use http::StatusCode;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A classified error.
///
/// The problem code is a decimal number whose integer part is the HTTP status
/// (`409.1` is reported as `409 Conflict`).
#[derive(Clone, Debug, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Problem {
    #[serde(skip)]
    status: StatusCode,
    message: String,
    #[serde(serialize_with = "serialize_problem_code")]
    code: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl Problem {
    /// Create a problem from a problem code and message.
    ///
    /// The HTTP status is the integer part of `code`. Codes outside the valid
    /// status range report as `500 Internal Server Error`.
    pub fn new<S: Into<String>>(code: f64, message: S) -> Self {
        Self {
            status: status_for_code(code),
            message: message.into(),
            code,
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The request could not be decoded as `format`.
    pub fn unparseable(format: &str, raw_length: usize) -> Self {
        Self::new(
            400.1,
            format!("Could not parse the given data ({raw_length} chars) as {format}."),
        )
        .with_details(serde_json::json!({ "format": format, "rawLength": raw_length }))
    }

    /// A required parameter was not supplied.
    pub fn missing_parameter(field: &str) -> Self {
        Self::new(400.2, format!("Required parameter {field} missing."))
            .with_details(serde_json::json!({ "field": field }))
    }

    /// A request header was missing or did not have the expected shape.
    ///
    /// A missing header is reported with the value `(nothing)`.
    pub fn invalid_header(field: &str, value: Option<&str>) -> Self {
        let value = value.unwrap_or("(nothing)");
        Self::new(
            400.9,
            format!(
                "An expected header field ({field}) did not match the expected format (got: {value})."
            ),
        )
        .with_details(serde_json::json!({ "field": field, "value": value }))
    }

    /// A request body exceeded the accepted size.
    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            413.1,
            format!("The request body exceeds the maximum accepted size of {limit} bytes."),
        )
        .with_details(serde_json::json!({ "limit": limit }))
    }

    pub fn not_found() -> Self {
        Self::new(404.1, "Could not find the resource you were looking for.")
    }

    pub fn unknown_internal() -> Self {
        Self::new(500.1, "An unknown internal problem has occurred.")
    }

    /// A handler produced no result at all.
    pub fn empty_response() -> Self {
        Self::new(
            500.3,
            "The resource returned no data. This is likely a developer problem.",
        )
    }

    /// Get the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the problem code.
    pub fn code(&self) -> f64 {
        self.code
    }

    /// Get the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured details, if any.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

fn status_for_code(code: f64) -> StatusCode {
    if !code.is_finite() || code < 100.0 || code >= 1000.0 {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::from_u16(code.trunc() as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Integral codes go out as JSON integers (`404`), the rest as decimals (`409.1`).
fn serialize_problem_code<S>(code: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if code.fract() == 0.0 && code.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*code as i64)
    } else {
        serializer.serialize_f64(*code)
    }
}
