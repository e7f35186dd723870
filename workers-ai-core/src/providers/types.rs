//! Workers AI wire types
//!
//! Lenient deserialization targets for the OpenAI-style payloads some models
//! return. Every field is optional: a missing field is never a decode error.

use crate::protocol::{ToolCall, Usage};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Chat completion object (`choices[].message`) or chunk (`choices[].delta`)
///
/// `usage` is not part of this type; read it with [`decode_usage`] so a bad
/// usage block never fails the choices.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatChoice {
    pub message: Option<ChatMessage>,
    pub delta: Option<ChatMessage>,
    pub finish_reason: Option<String>,
}

/// Message or delta body; reasoning is kept apart from content
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    #[serde(deserialize_with = "tool_call_entries")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

/// Decodes each tool-call entry on its own, dropping entries that match
/// neither layout
fn tool_call_entries<'de, D>(deserializer: D) -> Result<Option<Vec<WireToolCall>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Ok(None),
        Some(other) => {
            tracing::warn!("Ignoring non-array tool_calls: {}", other);
            return Ok(None);
        }
    };

    let calls = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<WireToolCall>(entry.clone()) {
            Ok(call) => Some(call),
            Err(e) => {
                tracing::warn!("Skipping undecodable tool call {}: {}", entry, e);
                None
            }
        })
        .collect();
    Ok(Some(calls))
}

/// Tool call as returned by Workers AI models
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireToolCall {
    /// OpenAI layout: `{ index?, id, type, function: { name, arguments } }`
    Function {
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        id: Option<String>,
        function: WireFunction,
    },
    /// Native layout: `{ name, arguments }`
    Flat {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireFunction {
    pub name: Option<String>,
    pub arguments: Option<Value>,
}

impl WireToolCall {
    /// Complete tool call with name and arguments passed through unchanged
    pub fn into_tool_call(self) -> ToolCall {
        match self {
            WireToolCall::Function { id, function, .. } => ToolCall {
                id,
                name: function.name.unwrap_or_default(),
                arguments: function.arguments.unwrap_or(Value::Null),
            },
            WireToolCall::Flat { id, name, arguments } => ToolCall { id, name, arguments },
        }
    }
}

/// Upstream usage block; null or non-numeric counts read as zero
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireUsage {
    #[serde(deserialize_with = "token_count")]
    pub prompt_tokens: u32,
    #[serde(deserialize_with = "token_count")]
    pub completion_tokens: u32,
    #[serde(deserialize_with = "token_count")]
    pub total_tokens: u32,
}

fn token_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(0, count_of))
}

fn count_of(value: &Value) -> u32 {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).unwrap_or(u32::MAX);
    }
    // float casts saturate; negatives and NaN land on 0
    value.as_f64().map_or(0, |f| f as u32)
}

/// Usage from the `usage` key of a payload, if it carries a usage object
pub fn decode_usage(payload: &Value) -> Option<Usage> {
    let usage = payload.get("usage").filter(|u| u.is_object())?;
    serde_json::from_value::<WireUsage>(usage.clone())
        .ok()
        .map(Usage::from)
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

/// Top-level keys of a payload, for diagnostics
pub fn top_level_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}
