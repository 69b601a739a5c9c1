//! # HTTP Utilities
//!
//! Helpers for interpreting platform API responses.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::text_processing::{redact_sensitive, truncate_preview};

const BODY_PREVIEW_LIMIT: usize = 200;

/// Return a user-friendly error message for common HTTP status codes.
///
/// # Example
/// ```rust
/// use dxwes_util::http::status_error_message;
///
/// let error_401 = status_error_message(401).unwrap();
/// assert!(error_401.contains("Unauthorized"));
///
/// let error_403 = status_error_message(403).unwrap();
/// assert!(error_403.contains("project"));
///
/// assert!(status_error_message(500).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: check the bearer token sent in the Authorization header".into()),
        403 => Some("Forbidden (403). Hint: check the token's permissions on the target project".into()),
        404 => Some("Not found (404). Hint: the object id may not exist or may belong to another project".into()),
        422 => Some("Unprocessable (422). Hint: the platform rejected the request inputs".into()),
        _ => None,
    }
}

/// Describe a failed response: status, optional hint and a redacted body preview.
pub fn describe_failed_response(status: StatusCode, body: &str) -> String {
    let preview = truncate_preview(&redact_sensitive(body), BODY_PREVIEW_LIMIT);
    match status_error_message(status.as_u16()) {
        Some(hint) => format!("{hint}; body: {preview}"),
        None => format!("HTTP {status}; body: {preview}"),
    }
}

/// Parse HTTP response text into JSON, providing detailed errors on failure.
///
/// Any parse error is decorated with the status code and up to 200 characters
/// of the (redacted) response body.
pub fn parse_response_json_strict(text: &str, status: Option<StatusCode>) -> Result<Value, JsonParseError> {
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        let preview = truncate_preview(&redact_sensitive(text), BODY_PREVIEW_LIMIT);

        JsonParseError::new(status_note, error, preview)
    })
}

/// Error returned when strict JSON parsing of an HTTP response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct JsonParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl JsonParseError {
    pub fn new(status_note: String, source: serde_json::Error, body_preview: String) -> Self {
        Self {
            status_note,
            source,
            body_preview,
        }
    }

    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}
