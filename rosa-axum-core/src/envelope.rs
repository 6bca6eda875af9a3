//! OpenRosa response envelopes.
//!
//! OpenRosa clients expect every non-form response, errors included, to be
//! wrapped in a small XML document:
//!
//! ```text
//! <OpenRosaResponse xmlns="http://openrosa.org/http/response" items="0">
//!   <message nature="error">...</message>
//! </OpenRosaResponse>
//! ```

use std::fmt;

/// XML namespace of OpenRosa response documents.
pub const OPENROSA_RESPONSE_NS: &str = "http://openrosa.org/http/response";

/// The `nature` attribute of an OpenRosa message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nature {
    Error,
    Success,
}

impl Nature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nature::Error => "error",
            Nature::Success => "success",
        }
    }
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-message OpenRosa response document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRosaMessage {
    nature: Nature,
    message: String,
}

impl OpenRosaMessage {
    pub fn new<S: Into<String>>(nature: Nature, message: S) -> Self {
        Self {
            nature,
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(Nature::Error, message)
    }

    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(Nature::Success, message)
    }

    pub fn nature(&self) -> Nature {
        self.nature
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the XML document.
    pub fn render(&self) -> String {
        format!(
            "<OpenRosaResponse xmlns=\"{OPENROSA_RESPONSE_NS}\" items=\"0\">\
             <message nature=\"{}\">{}</message>\
             </OpenRosaResponse>",
            self.nature,
            escape_xml(&self.message)
        )
    }
}

/// Escape text for use in XML character data and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
