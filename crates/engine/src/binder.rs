//! Binds an inbound request to a [`SessionDescriptor`].

use dxwes_types::{InvocationEvent, PROJECT_KEY, SessionDescriptor};

use crate::error::AuthError;

const AUTHORIZATION_HEADER: &str = "Authorization";
const BEARER_SCHEME: &str = "bearer";

/// Extract the bearer credential and target project from `event`.
///
/// The credential itself is not validated; a bad token surfaces later as an
/// authorization failure from the platform.
pub fn bind(event: &InvocationEvent) -> Result<SessionDescriptor, AuthError> {
    let header = event.header(AUTHORIZATION_HEADER).ok_or(AuthError::MissingHeader)?;
    let credential = bearer_credential(header).ok_or(AuthError::MalformedHeader)?;

    let project_id = event
        .body
        .key_values
        .get(PROJECT_KEY)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::MissingProject {
            key: PROJECT_KEY.to_string(),
        })?;

    Ok(SessionDescriptor::new(credential, project_id))
}

/// Strip the bearer scheme from an Authorization header value.
fn bearer_credential(header: &str) -> Option<&str> {
    let (scheme, credential) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}
