//! Configuration loading and environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dirs_next::config_dir;
use dxwes_util::expand_tilde;
use tracing::debug;

use crate::config::{ConfigError, ServiceConfig, validate_config};

/// Returns the default path for the service configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("DXWES_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("dxwes").join("config.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from `path`, applies environment overrides and validates the result.
///
/// A missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|error| ConfigError::Parse {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        ServiceConfig::default()
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Overlay settings taken from the process environment.
pub fn apply_env_overrides(config: &mut ServiceConfig) -> Result<(), ConfigError> {
    if let Some(value) = env_string("DX_API_BASE") {
        config.api_base_url = value;
    }
    if let Some(value) = env_string("DXWES_COMPILER") {
        config.compiler.program = value;
    }
    if let Some(value) = env_string("DXWES_COMPILER_JAR") {
        config.compiler.jar_path = Some(value);
    }
    if let Some(value) = env_string("DXWES_COMPILER_ARGS") {
        config.compiler.extra_args = value.split_whitespace().map(str::to_string).collect();
    }
    if let Some(value) = env_string("DX_HELPER_PATH") {
        config.compiler.dx_helper_path = value;
    }
    if let Some(value) = env_string("DXWES_SCRATCH_ROOT") {
        config.scratch_root = Some(expand_tilde(&value));
    }
    if let Some(value) = env_parsed("DXWES_REQUEST_TIMEOUT_SECS")? {
        config.request_timeout_secs = value;
    }
    if let Some(value) = env_parsed("DXWES_UPLOAD_CHUNK_SIZE")? {
        config.upload_chunk_size = value;
    }
    Ok(())
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parsed<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|value| {
            value.parse::<T>().map_err(|error| ConfigError::InvalidEnv {
                name: name.to_string(),
                reason: error.to_string(),
            })
        })
        .transpose()
}
