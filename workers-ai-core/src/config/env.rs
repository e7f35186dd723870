//! Environment variable interpolation for configuration

use super::error::{ConfigError, ConfigResult};
use super::schema::RestConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

/// Account id used by `RestConfig::from_env`
pub const ACCOUNT_ID_VAR: &str = "CLOUDFLARE_ACCOUNT_ID";
/// API token used by `RestConfig::from_env`
pub const API_KEY_VAR: &str = "CLOUDFLARE_API_KEY";
/// Optional API root override used by `RestConfig::from_env`
pub const BASE_URL_VAR: &str = "CLOUDFLARE_AI_BASE_URL";

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is a valid regex")
});

pub(crate) fn env_var_pattern() -> &'static Regex {
    &ENV_VAR_PATTERN
}

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> ConfigResult<String> {
    let mut result = content.to_string();

    for cap in env_var_pattern().captures_iter(content) {
        let var_name = &cap[1];
        let value = env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound {
            var: var_name.to_string(),
        })?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

/// Interpolate the fields that commonly carry `${VAR}` references after parsing
pub fn interpolate_config_env_vars(config: &mut RestConfig) -> ConfigResult<()> {
    if env_var_pattern().is_match(config.api_key.expose_secret()) {
        config.api_key = SecretString::new(interpolate_env_vars(config.api_key.expose_secret())?);
    }
    if env_var_pattern().is_match(&config.account_id) {
        config.account_id = interpolate_env_vars(&config.account_id)?;
    }
    if env_var_pattern().is_match(&config.base_url) {
        config.base_url = interpolate_env_vars(&config.base_url)?;
    }
    Ok(())
}

impl RestConfig {
    /// Build a config from `CLOUDFLARE_ACCOUNT_ID`, `CLOUDFLARE_API_KEY` and
    /// the optional `CLOUDFLARE_AI_BASE_URL`
    pub fn from_env() -> ConfigResult<Self> {
        let account_id = required_var(ACCOUNT_ID_VAR)?;
        let api_key = required_var(API_KEY_VAR)?;

        let mut config = RestConfig::new(account_id, api_key);
        if let Ok(base_url) = env::var(BASE_URL_VAR) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn required_var(name: &str) -> ConfigResult<String> {
    env::var(name).map_err(|_| ConfigError::EnvVarNotFound {
        var: name.to_string(),
    })
}
