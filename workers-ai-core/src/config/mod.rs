//! Configuration for the REST transport
//!
//! Settings can be built in code, read from the `CLOUDFLARE_*` environment
//! variables, or loaded from YAML/JSON files with `${VAR}` interpolation.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_env_vars, ACCOUNT_ID_VAR, API_KEY_VAR, BASE_URL_VAR};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{RestConfig, DEFAULT_BASE_URL};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<RestConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let config: RestConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    finish_loading(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<RestConfig> {
    let path = path.as_ref();
    let content = read_config(path)?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let config: RestConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    finish_loading(config)
}

fn read_config(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

fn finish_loading(mut config: RestConfig) -> ConfigResult<RestConfig> {
    env::interpolate_config_env_vars(&mut config)?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}
