//! Per-request session descriptor.

use std::fmt;

use serde::Serialize;

/// Token type reported to the platform toolchain in the serialized security context.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Credential plus project scope that authorizes every remote call of a single request.
///
/// A descriptor is built once by the binder and handed by reference to each stage.
/// It is never stored in global state, and its `Debug` output never shows the credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    bearer_credential: String,
    project_id: String,
}

/// Wire form of the security context consumed by the dx toolkit (`DX_SECURITY_CONTEXT`).
#[derive(Serialize)]
struct SecurityContext<'a> {
    auth_token_type: &'a str,
    auth_token: &'a str,
}

impl SessionDescriptor {
    pub fn new(bearer_credential: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            bearer_credential: bearer_credential.into(),
            project_id: project_id.into(),
        }
    }

    /// The raw bearer credential. Callers must not log this value.
    pub fn bearer_credential(&self) -> &str {
        &self.bearer_credential
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", BEARER_TOKEN_TYPE, self.bearer_credential)
    }

    /// Serialize the security context the way the dx toolkit reads it from its environment.
    pub fn security_context_json(&self) -> String {
        let context = SecurityContext {
            auth_token_type: BEARER_TOKEN_TYPE,
            auth_token: &self.bearer_credential,
        };
        // Two string fields cannot fail to serialize.
        serde_json::to_string(&context).unwrap_or_default()
    }
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("bearer_credential", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}
