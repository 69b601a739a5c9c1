//! Service configuration: file model, loading and validation.

mod io;
mod model;
mod validation;

pub use io::{apply_env_overrides, default_config_path, load_config, load_config_from_path};
pub use model::{CompilerConfig, ConfigError, ServiceConfig};
pub use validation::{ValidationError, validate_config};
