//! Errors returned by the platform client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DxApiError {
    #[error("invalid API base URL: {reason}")]
    InvalidBaseUrl { reason: String },

    #[error("invalid object id '{id}'")]
    InvalidId { id: String },

    #[error("network error calling {route}: {message}")]
    Network { route: String, message: String },

    #[error("{route} failed: {message}")]
    Status { route: String, status: u16, message: String },

    #[error("unexpected response from {route}: {message}")]
    Decode { route: String, message: String },
}

impl DxApiError {
    pub fn network(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            route: route.into(),
            message: message.into(),
        }
    }

    pub fn decode(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            route: route.into(),
            message: message.into(),
        }
    }

    /// HTTP status reported by the platform, when the call got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403 responses.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
