//! # Text Processing Utilities
//!
//! Redaction of credentials from text that crosses a trust boundary: compiler
//! stderr, platform error bodies and anything else that ends up in an error
//! message or a log line.

use once_cell::sync::Lazy;
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Redacts values that look like secrets in a string.
///
/// Authorization headers, inline bearer tokens, the `auth_token` field of a
/// serialized dx security context and `*_TOKEN=`/`*_SECRET=` style assignments
/// are replaced with `[REDACTED]`; the surrounding key is kept for debugging.
///
/// # Example
/// ```rust
/// use dxwes_util::redact_sensitive;
///
/// let redacted = redact_sensitive("Authorization: Bearer secret123");
/// assert_eq!(redacted, "Authorization: [REDACTED]");
///
/// let redacted = redact_sensitive(r#"{"auth_token_type": "Bearer", "auth_token": "abc"}"#);
/// assert!(!redacted.contains("abc"));
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REDACTED}{suffix}")
            })
            .to_string();
    }

    redacted
}

/// Redacts pattern-shaped secrets and every literal occurrence of `secret`.
///
/// Use this for collaborator output when the exact credential is known, since
/// a tool may echo it back in a shape no pattern anticipates.
pub fn redact_secret(input: &str, secret: &str) -> String {
    let redacted = if secret.trim().is_empty() {
        input.to_string()
    } else {
        input.replace(secret, REDACTED)
    };
    redact_sensitive(&redacted)
}

/// Collapse whitespace and cap `text` at roughly `limit` characters for error messages.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:[ \t]+)([^\r\n]+)",
        r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)",
        r#"(?i)("auth_token"\s*:\s*")([^"]*)(")"#,
        r"(?i)(\b[A-Z0-9_]*(?:TOKEN|SECRET|PASSWORD|API_KEY)=)([^\s]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction pattern should compile"))
    .collect()
});
