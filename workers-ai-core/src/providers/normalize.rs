//! Response normalization
//!
//! Workers AI answers in more than one layout depending on the model. The
//! shape is detected structurally, in a fixed order, and anything that
//! matches no known layout is rejected rather than guessed at.

use crate::protocol::{FinishReason, GenerateResult, ToolCall};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::types::{
    decode_usage, top_level_keys, ChatCompletion, ChatMessage, WireToolCall,
};
use serde_json::Value;

/// Recognized layouts of a non-streaming response
#[derive(Debug)]
pub enum ResponseShape<'a> {
    /// `{ "response": "..." }`
    Completion(&'a str),
    /// OpenAI-style chat completion with a non-empty `choices` array
    ChatCompletion,
    Unrecognized,
}

impl<'a> ResponseShape<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        if let Some(text) = raw.get("response").and_then(Value::as_str) {
            return ResponseShape::Completion(text);
        }
        match raw.get("choices").and_then(Value::as_array) {
            Some(choices) if !choices.is_empty() => ResponseShape::ChatCompletion,
            _ => ResponseShape::Unrecognized,
        }
    }
}

/// Map a raw response onto the canonical result
pub fn normalize(raw: &Value) -> ProviderResult<GenerateResult> {
    match ResponseShape::detect(raw) {
        ResponseShape::Completion(text) => Ok(GenerateResult::text(text)),
        ResponseShape::ChatCompletion => normalize_chat_completion(raw),
        ResponseShape::Unrecognized => Err(ProviderError::Normalization {
            keys: top_level_keys(raw),
        }),
    }
}

fn normalize_chat_completion(raw: &Value) -> ProviderResult<GenerateResult> {
    let completion: ChatCompletion =
        serde_json::from_value(raw.clone()).map_err(|e| {
            tracing::debug!("Chat completion did not decode: {}", e);
            ProviderError::Normalization {
                keys: top_level_keys(raw),
            }
        })?;

    let usage = decode_usage(raw).unwrap_or_default();
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(ProviderError::Normalization {
            keys: top_level_keys(raw),
        });
    };
    let ChatMessage {
        content,
        reasoning_content,
        tool_calls,
    } = choice.message.unwrap_or_default();

    Ok(GenerateResult {
        text: content.unwrap_or_default(),
        reasoning: non_empty(reasoning_content),
        tool_calls: collect_tool_calls(tool_calls),
        finish_reason: FinishReason::from_upstream(choice.finish_reason.as_deref()),
        usage,
    })
}

fn collect_tool_calls(tool_calls: Option<Vec<WireToolCall>>) -> Vec<ToolCall> {
    tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(WireToolCall::into_tool_call)
        .collect()
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
