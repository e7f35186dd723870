//! Outbound request assembly
//!
//! Converts a caller's prompt and call options into the JSON inputs Workers AI
//! expects. Nothing here touches the network or the binding.

use crate::protocol::{CallOptions, Message, Prompt, ResponseFormat, ToolCall, ToolDefinition};
use crate::providers::options::CoercedSettings;
use serde_json::{json, Map, Value};

/// Transport-agnostic request handed to a [`TransportClient`](crate::providers::TransportClient)
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub model_id: String,

    /// JSON object sent as the POST body or as the binding's inputs
    pub payload: Value,

    pub settings: CoercedSettings,
}

impl OutboundRequest {
    /// Whether the payload asks for a streamed response
    pub fn is_stream(&self) -> bool {
        self.payload.get("stream").and_then(Value::as_bool) == Some(true)
    }
}

/// Assemble the outbound request for one call
pub fn build_request(
    model_id: &str,
    prompt: &Prompt,
    options: &CallOptions,
    settings: CoercedSettings,
    stream: bool,
) -> OutboundRequest {
    let mut payload = Map::new();

    match prompt {
        Prompt::Text(text) => {
            payload.insert("prompt".to_string(), Value::String(text.clone()));
        }
        Prompt::Messages(messages) => {
            payload.insert(
                "messages".to_string(),
                Value::Array(messages.iter().map(to_wire_message).collect()),
            );
        }
    }

    insert_opt(&mut payload, "max_tokens", options.max_tokens.map(Value::from));
    insert_opt(&mut payload, "temperature", options.temperature.map(f32_value));
    insert_opt(&mut payload, "top_p", options.top_p.map(f32_value));
    insert_opt(&mut payload, "seed", options.seed.map(Value::from));
    insert_opt(
        &mut payload,
        "frequency_penalty",
        options.frequency_penalty.map(f32_value),
    );
    insert_opt(
        &mut payload,
        "presence_penalty",
        options.presence_penalty.map(f32_value),
    );

    if !options.tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            Value::Array(options.tools.iter().map(to_wire_tool).collect()),
        );
    }

    insert_opt(
        &mut payload,
        "response_format",
        options.response_format.as_ref().map(to_wire_response_format),
    );

    if stream {
        payload.insert("stream".to_string(), Value::Bool(true));
    }

    OutboundRequest {
        model_id: model_id.to_string(),
        payload: Value::Object(payload),
        settings,
    }
}

fn insert_opt(payload: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        payload.insert(key.to_string(), value);
    }
}

// Going through the decimal text keeps 0.7f32 as 0.7 instead of 0.699999988079071
fn f32_value(value: f32) -> Value {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_wire_message(message: &Message) -> Value {
    let mut wire = Map::new();
    wire.insert("role".to_string(), Value::String(message.role.as_str().to_string()));
    wire.insert("content".to_string(), Value::String(message.content.clone()));

    if let Some(name) = &message.name {
        wire.insert("name".to_string(), Value::String(name.clone()));
    }
    if !message.tool_calls.is_empty() {
        wire.insert(
            "tool_calls".to_string(),
            Value::Array(message.tool_calls.iter().map(to_wire_tool_call).collect()),
        );
    }
    if let Some(id) = &message.tool_call_id {
        wire.insert("tool_call_id".to_string(), Value::String(id.clone()));
    }

    Value::Object(wire)
}

fn to_wire_tool_call(call: &ToolCall) -> Value {
    let arguments = match &call.arguments {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": arguments,
        }
    })
}

fn to_wire_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn to_wire_response_format(format: &ResponseFormat) -> Value {
    match format {
        ResponseFormat::Text => json!({ "type": "text" }),
        ResponseFormat::Json { schema: Some(schema) } => json!({
            "type": "json_schema",
            "json_schema": schema,
        }),
        ResponseFormat::Json { schema: None } => json!({ "type": "json_object" }),
    }
}
