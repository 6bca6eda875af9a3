//! OpenRosa header handling.
//!
//! Every OpenRosa response carries a fixed set of headers, rejected ones
//! included. Requests must declare the protocol version and a date.

use std::borrow::Cow;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, NaiveDateTime, Utc};
use rosa_axum_core::Problem;

use crate::context::ResponseContext;

/// Header name for the OpenRosa protocol version.
pub const OPENROSA_VERSION_HEADER: &str = "X-OpenRosa-Version";

/// The only supported OpenRosa protocol version.
pub const OPENROSA_VERSION: &str = "1.0";

/// Header advertising the largest submission body the server accepts.
pub const OPENROSA_ACCEPT_CONTENT_LENGTH_HEADER: &str = "X-OpenRosa-Accept-Content-Length";

/// Value of `X-OpenRosa-Accept-Content-Length`.
pub const OPENROSA_ACCEPT_CONTENT_LENGTH: &str = "20000000";

/// Value of `Content-Language` on OpenRosa responses.
pub const OPENROSA_CONTENT_LANGUAGE: &str = "en";

const DATE_FIELD: &str = "Date";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Layout of `Date.toString()` once the weekday and zone suffix are gone.
const CLIENT_DATE_LAYOUT: &str = "%b %d %Y %H:%M:%S GMT";

/// Write the mandatory OpenRosa response headers.
pub fn set_response_headers(response: &mut ResponseContext, now: DateTime<Utc>) {
    response
        .set_header(header::CONTENT_LANGUAGE, OPENROSA_CONTENT_LANGUAGE)
        .set_header(OPENROSA_VERSION_HEADER, OPENROSA_VERSION)
        .set_header(
            OPENROSA_ACCEPT_CONTENT_LENGTH_HEADER,
            OPENROSA_ACCEPT_CONTENT_LENGTH,
        )
        .set_header(header::DATE, http_date(now));
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Validate the request headers, stopping at the first violation.
pub fn validate_request(headers: &HeaderMap) -> Result<(), Problem> {
    validate_protocol_version(headers)?;
    validate_date(headers)
}

/// `X-OpenRosa-Version` must be exactly `1.0`.
pub fn validate_protocol_version(headers: &HeaderMap) -> Result<(), Problem> {
    match header_value(headers, OPENROSA_VERSION_HEADER) {
        Some(v) if v == OPENROSA_VERSION => Ok(()),
        other => Err(Problem::invalid_header(
            OPENROSA_VERSION_HEADER,
            other.as_deref(),
        )),
    }
}

/// `Date` must be present and parse as a date-time.
pub fn validate_date(headers: &HeaderMap) -> Result<(), Problem> {
    let value = header_value(headers, DATE_FIELD);
    match value.as_deref().map(parse_request_date) {
        Some(Some(_)) => Ok(()),
        _ => Err(Problem::invalid_header(DATE_FIELD, value.as_deref())),
    }
}

/// Parse a request `Date` value, tolerating non-standard timezone suffixes.
///
/// The weekday is ignored, so a weekday that does not match the date is not
/// an error.
pub fn parse_request_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize_date(raw);
    let date = strip_weekday(&normalized);
    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_rfc3339(date))
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(date, CLIENT_DATE_LAYOUT)
                .ok()
                .map(|date| date.and_utc())
        })
}

/// Drop a leading `Ddd, ` or `Ddd ` weekday token.
fn strip_weekday(raw: &str) -> &str {
    match raw.get(..3) {
        Some(day) if WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(day)) => {
            raw[3..].trim_start_matches(',').trim_start()
        }
        _ => raw,
    }
}

/// Cut anything trailing `GMT` down to a bare `GMT`.
///
/// Some clients send `GMT+0500` or `GMT+05:00`; the suffix is dropped and the
/// time read as GMT.
pub fn normalize_date(raw: &str) -> Cow<'_, str> {
    let raw = raw.trim();
    match raw.find("GMT") {
        Some(idx) if raw.len() > idx + 3 => Cow::Owned(format!("{}GMT", &raw[..idx])),
        _ => Cow::Borrowed(raw),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
}
