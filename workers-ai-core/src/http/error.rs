//! HTTP error mapping utilities

use crate::providers::ProviderError;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

/// Map a non-success HTTP status and response body to a ProviderError
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> ProviderError {
    let message = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()))
        });

    ProviderError::Transport {
        status: Some(status.as_u16()),
        message: format!("{} [request_id: {}]", message, request_id),
        body,
    }
}

/// Extract a human-readable message from a JSON error body
pub(crate) fn extract_error_message(json: &Value) -> Option<String> {
    // Cloudflare envelope: { "success": false, "errors": [{ "code": 7003, "message": "..." }] }
    if let Some(error) = json
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(match error.get("code").and_then(Value::as_u64) {
                Some(code) => format!("{} (code {})", message, code),
                None => message.to_string(),
            });
        }
    }

    // OpenAI format: { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // Generic format: { "message": "..." } or { "error": "..." }
    json.get("message")
        .or_else(|| json.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
