//! Configuration validation utilities

use super::env::env_var_pattern;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::RestConfig;
use url::Url;

/// Validator for REST connection settings
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration, reporting the first failing field
    pub fn validate(&self, config: &RestConfig) -> Result<(), ValidationError> {
        self.validate_credentials(config)?;
        self.validate_base_url(&config.base_url)?;
        self.validate_limits(config)?;
        Ok(())
    }

    fn validate_credentials(&self, config: &RestConfig) -> Result<(), ValidationError> {
        if config.account_id.trim().is_empty() {
            return Err(ValidationError::required("account_id"));
        }
        if config.account_id.contains('/') {
            return Err(ValidationError::new(
                "account_id",
                ValidationErrorKind::OutOfRange {
                    message: "must be a single path segment".to_string(),
                },
            ));
        }
        if config.api_key.is_empty() {
            return Err(ValidationError::required("api_key"));
        }

        for (field, value) in [
            ("account_id", config.account_id.as_str()),
            ("api_key", config.api_key.expose_secret()),
        ] {
            if let Some(cap) = env_var_pattern().captures(value) {
                return Err(ValidationError::new(
                    field,
                    ValidationErrorKind::UnresolvedPlaceholder {
                        placeholder: cap[0].to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    fn validate_base_url(&self, base_url: &str) -> Result<(), ValidationError> {
        let url = Url::parse(base_url).map_err(|e| {
            ValidationError::new(
                "base_url",
                ValidationErrorKind::InvalidUrl {
                    message: e.to_string(),
                },
            )
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::new(
                "base_url",
                ValidationErrorKind::InvalidUrl {
                    message: format!("unsupported scheme '{}'", url.scheme()),
                },
            )
            .with_context("expected http or https"));
        }
        if url.query().is_some() {
            return Err(ValidationError::new(
                "base_url",
                ValidationErrorKind::InvalidUrl {
                    message: "query strings are not allowed".to_string(),
                },
            ));
        }
        Ok(())
    }

    fn validate_limits(&self, config: &RestConfig) -> Result<(), ValidationError> {
        if config.timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.connect_timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "connect_timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.max_response_bytes == 0 {
            return Err(ValidationError::out_of_range(
                "max_response_bytes",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl RestConfig {
    /// Validate this configuration with the default rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        ConfigValidator::new().validate(self)
    }
}
