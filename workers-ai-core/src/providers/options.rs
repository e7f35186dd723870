//! Passthrough settings and their coercion per transport
//!
//! Settings are forwarded to Workers AI without adapter-defined meaning. The
//! REST endpoint receives them as query parameters, so every value must
//! become a string; the binding receives them as native values.

use crate::providers::error::{ProviderError, ProviderResult};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Passthrough settings keyed by option name
pub type Settings = BTreeMap<String, SettingValue>;

/// A single passthrough setting value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Key present without a value
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Objects and arrays; only the binding accepts these
    Structured(Value),
}

impl SettingValue {
    /// The value as JSON, or `None` for [`SettingValue::Undefined`]
    pub fn to_json(&self) -> Option<Value> {
        match self {
            SettingValue::Undefined => None,
            SettingValue::Null => Some(Value::Null),
            SettingValue::Bool(b) => Some(Value::Bool(*b)),
            SettingValue::Number(n) => Some(Value::Number(n.clone())),
            SettingValue::String(s) => Some(Value::String(s.clone())),
            SettingValue::Structured(v) => Some(v.clone()),
        }
    }

    fn coerce_to_string(&self) -> Option<String> {
        match self {
            SettingValue::Bool(b) => Some(b.to_string()),
            SettingValue::Number(n) => Some(number_to_string(n)),
            SettingValue::String(s) => Some(s.clone()),
            SettingValue::Undefined | SettingValue::Null | SettingValue::Structured(_) => None,
        }
    }
}

/// Decimal rendering that writes integral floats without a fraction (`1.0` -> `"1"`)
fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Number(value.into())
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Number(value.into())
    }
}

impl From<u64> for SettingValue {
    fn from(value: u64) -> Self {
        SettingValue::Number(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        // NaN and infinities have no JSON number form; keep their text
        Number::from_f64(value)
            .map(SettingValue::Number)
            .unwrap_or_else(|| SettingValue::String(value.to_string()))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SettingValue::Null,
            Value::Bool(b) => SettingValue::Bool(b),
            Value::Number(n) => SettingValue::Number(n),
            Value::String(s) => SettingValue::String(s),
            other => SettingValue::Structured(other),
        }
    }
}

impl<T: Into<SettingValue>> From<Option<T>> for SettingValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SettingValue::Undefined)
    }
}

/// Shape the active transport needs its settings in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// Every value rendered as a string (REST query parameters)
    StringValues,
    /// Values passed through untouched (binding)
    Structured,
}

/// Settings after coercion for a specific transport
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedSettings {
    /// Key/value pairs ready for a query string
    Query(Vec<(String, String)>),
    /// Native values for the binding
    Structured(Settings),
}

impl CoercedSettings {
    /// Settings as a JSON object; undefined entries are omitted
    pub fn to_json(&self) -> Map<String, Value> {
        match self {
            CoercedSettings::Query(pairs) => pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            CoercedSettings::Structured(settings) => settings
                .iter()
                .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CoercedSettings::Query(pairs) => pairs.is_empty(),
            CoercedSettings::Structured(settings) => settings.is_empty(),
        }
    }
}

impl Default for CoercedSettings {
    fn default() -> Self {
        CoercedSettings::Structured(Settings::new())
    }
}

/// Convert settings into the shape the target transport accepts.
///
/// Fails on the first value that cannot be represented; nothing is returned
/// for the other keys in that case.
pub fn coerce(settings: &Settings, target: TargetShape) -> ProviderResult<CoercedSettings> {
    match target {
        TargetShape::Structured => Ok(CoercedSettings::Structured(settings.clone())),
        TargetShape::StringValues => settings
            .iter()
            .map(|(key, value)| {
                value
                    .coerce_to_string()
                    .map(|s| (key.clone(), s))
                    .ok_or_else(|| ProviderError::Coercion { key: key.clone() })
            })
            .collect::<ProviderResult<Vec<_>>>()
            .map(CoercedSettings::Query),
    }
}
