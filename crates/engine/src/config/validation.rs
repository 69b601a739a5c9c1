//! Configuration validation.

use dxwes_api::validate_base_url;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;

/// Largest part the platform accepts in a single upload.
const MAX_UPLOAD_CHUNK_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Longest request or connect timeout accepted, one day.
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Validate the whole service configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), ValidationError> {
    validate_base_url(&config.api_base_url).map_err(|error| ValidationError::InvalidField {
        field: "apiBaseUrl".to_string(),
        reason: error.to_string(),
    })?;

    if config.compiler.program.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "compiler.program".to_string(),
        });
    }
    if config.compiler.dx_helper_path.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "compiler.dxHelperPath".to_string(),
        });
    }

    if config.upload_chunk_size == 0 || config.upload_chunk_size as u64 > MAX_UPLOAD_CHUNK_SIZE {
        return Err(ValidationError::InvalidField {
            field: "uploadChunkSize".to_string(),
            reason: format!("must be between 1 and {MAX_UPLOAD_CHUNK_SIZE} bytes"),
        });
    }

    for (field, value) in [
        ("requestTimeoutSecs", config.request_timeout_secs),
        ("connectTimeoutSecs", config.connect_timeout_secs),
    ] {
        if value == 0 || value > MAX_TIMEOUT_SECS {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                reason: format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
            });
        }
    }

    debug!(api_base_url = %config.api_base_url, "validated service configuration");
    Ok(())
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },
}
