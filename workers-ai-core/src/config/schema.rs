//! Configuration schema structures with serde support

use super::secrets::SecretString;
use serde::{Deserialize, Serialize};

/// Public Cloudflare API root used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Connection settings for the Workers AI REST API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RestConfig {
    /// Cloudflare account identifier (path segment of the run endpoint)
    pub account_id: String,

    /// API token sent as a bearer credential (supports `${VAR}` interpolation)
    pub api_key: SecretString,

    /// API root, without the `/accounts/...` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for non-streaming requests, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Largest non-streaming response body accepted
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_response_bytes() -> usize {
    10 * 1024 * 1024
}

impl RestConfig {
    /// Config for the public API with default timeouts
    pub fn new(account_id: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
        }
    }

    /// Point the transport at another API root (e.g. a gateway or a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
account_id: abc123
api_key: secret-token-value
"#;
        let config: RestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.max_response_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = r#"
account_id: abc123
api_key: secret-token-value
retries: 3
"#;
        assert!(serde_yaml::from_str::<RestConfig>(yaml).is_err());
    }
}
