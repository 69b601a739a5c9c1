//! Data models for service configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dxwes_api::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::localize::DEFAULT_UPLOAD_CHUNK_SIZE;

/// Settings shared by every request the service handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Platform API endpoint.
    pub api_base_url: String,
    /// How to run the workflow compiler.
    pub compiler: CompilerConfig,
    /// Parent of the per-request scratch directories. Defaults to the system temp dir.
    pub scratch_root: Option<PathBuf>,
    /// Budget for one whole request, from binding to submission.
    pub request_timeout_secs: u64,
    /// Connect timeout for platform and fetch connections.
    pub connect_timeout_secs: u64,
    /// Upload part size in bytes.
    pub upload_chunk_size: usize,
}

/// Compiler process settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Executable to run, looked up on `PATH` when it has no directory part.
    pub program: String,
    /// Jar passed as `-jar <path>` when set.
    pub jar_path: Option<String>,
    /// Arguments placed before the `compile` subcommand.
    pub extra_args: Vec<String>,
    /// Location of the `dx` helper shipped with the compiler.
    pub dx_helper_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            compiler: CompilerConfig::default(),
            scratch_root: None,
            request_timeout_secs: 900,
            connect_timeout_secs: 30,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            jar_path: Some("dxWDL-0.57.jar".to_string()),
            extra_args: Vec::new(),
            dx_helper_path: "bin/dx".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid value for {name}: {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error(transparent)]
    Validation(#[from] crate::config::ValidationError),
}
