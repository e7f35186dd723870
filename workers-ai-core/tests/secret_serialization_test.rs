//! Test that SecretString serialization preserves values for persistence

use serde::{Deserialize, Serialize};
use workers_ai_core::config::{RestConfig, SecretString};

#[derive(Serialize, Deserialize, Debug)]
struct TestConfig {
    api_key: SecretString,
    name: String,
}

#[test]
fn test_secret_string_serialization_roundtrip() {
    let config = TestConfig {
        api_key: SecretString::new("cf-secret-key-123"),
        name: "test".to_string(),
    };

    // Serialize to JSON
    let json = serde_json::to_string(&config).unwrap();

    // The actual value is persisted, not the redaction marker
    assert!(json.contains("cf-secret-key-123"));
    assert!(!json.contains("[REDACTED]"));

    let deserialized: TestConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.api_key.expose_secret(), "cf-secret-key-123");
    assert_eq!(deserialized.name, "test");

    assert_eq!(format!("{:?}", deserialized.api_key), "[REDACTED]");
    assert_eq!(format!("{}", deserialized.api_key), "[REDACTED]");
}

#[test]
fn test_rest_config_yaml_roundtrip() {
    let config = RestConfig::new("acct", "my-api-key-value");

    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(yaml.contains("my-api-key-value"));
    assert!(!yaml.contains("[REDACTED]"));

    let deserialized: RestConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(deserialized, config);
}

#[test]
fn test_rest_config_debug_hides_key() {
    let config = RestConfig::new("acct", "my-api-key-value");

    let debug_output = format!("{:?}", config);
    assert!(!debug_output.contains("my-api-key-value"));
    assert!(debug_output.contains("[REDACTED]"));
    assert!(debug_output.contains("acct"));
}
