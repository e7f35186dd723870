//! Streaming support
//!
//! Raw chunks arrive either as SSE events (REST, or a binding handing back an
//! event stream) or as already-decoded JSON values (binding). Both end up as a
//! [`RawChunkStream`], which [`reconstruct`] folds into canonical
//! [`StreamPart`]s while keeping the running aggregate.

use crate::protocol::{FinishReason, GenerateResult, StreamPart, ToolCall, Usage};
use crate::providers::adapter::{PartStream, RawChunkStream};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::normalize::non_empty;
use crate::providers::types::{decode_usage, ChatCompletion, WireToolCall};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

/// Sentinel event that ends a Workers AI event stream
const DONE_SENTINEL: &str = "[DONE]";

/// Decode Server-Sent Events into raw JSON chunks.
///
/// Stops at `data: [DONE]`. A transport error or a `data` field that is not
/// JSON yields one [`ProviderError::Stream`] and ends the sequence.
pub fn decode_event_stream<S, B, E>(stream: S) -> RawChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(stream.eventsource());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(ProviderError::stream(format!("Event stream interrupted: {}", e)));
                    return;
                }
            };

            let data = event.data.trim();
            if data == DONE_SENTINEL {
                return;
            }
            if data.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(data) {
                Ok(chunk) => {
                    yield Ok(chunk);
                }
                Err(e) => {
                    yield Err(ProviderError::stream(format!("Malformed chunk: {}", e)));
                    return;
                }
            }
        }

        tracing::debug!("Event stream ended without {}", DONE_SENTINEL);
    })
}

/// A stream holding one complete response as its only chunk
pub fn single_chunk(response: Value) -> RawChunkStream {
    Box::pin(futures::stream::once(async move { Ok(response) }))
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
    /// Set when the upstream sent arguments as a JSON value rather than text
    structured: Option<Value>,
}

impl PendingToolCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.name,
            arguments: self.structured.unwrap_or(Value::String(self.arguments)),
        }
    }
}

/// Running aggregate of a streamed generation
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    reasoning: String,
    tool_calls: BTreeMap<usize, PendingToolCall>,
    finish_reason: Option<FinishReason>,
    saw_chat_chunk: bool,
    terminal_usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw chunk into the aggregate and return the deltas it carried
    pub fn fold(&mut self, chunk: &Value) -> ProviderResult<Vec<StreamPart>> {
        if !chunk.is_object() {
            return Err(ProviderError::stream(format!(
                "Malformed chunk: expected a JSON object, got {}",
                chunk
            )));
        }

        // Only the last chunk's usage counts
        self.terminal_usage = decode_usage(chunk);

        if let Some(text) = chunk.get("response").and_then(Value::as_str) {
            return Ok(self.push_text(text).into_iter().collect());
        }

        match chunk.get("choices").and_then(Value::as_array) {
            Some(choices) if !choices.is_empty() => self.fold_chat_chunk(chunk),
            _ => Ok(Vec::new()),
        }
    }

    fn fold_chat_chunk(&mut self, chunk: &Value) -> ProviderResult<Vec<StreamPart>> {
        let completion: ChatCompletion = serde_json::from_value(chunk.clone())
            .map_err(|e| ProviderError::stream(format!("Malformed chunk: {}", e)))?;
        self.saw_chat_chunk = true;

        let mut parts = Vec::new();
        let Some(choice) = completion.choices.into_iter().next() else {
            return Ok(parts);
        };

        if let Some(reason) = choice.finish_reason.as_deref() {
            self.finish_reason = Some(FinishReason::from_upstream(Some(reason)));
        }

        let Some(body) = choice.delta.or(choice.message) else {
            return Ok(parts);
        };

        if let Some(reasoning) = body.reasoning_content.filter(|r| !r.is_empty()) {
            self.reasoning.push_str(&reasoning);
            parts.push(StreamPart::ReasoningDelta(reasoning));
        }
        if let Some(text) = body.content.as_deref() {
            parts.extend(self.push_text(text));
        }
        for (position, call) in body.tool_calls.unwrap_or_default().into_iter().enumerate() {
            parts.push(self.push_tool_call(position, call));
        }

        Ok(parts)
    }

    fn push_text(&mut self, text: &str) -> Option<StreamPart> {
        if text.is_empty() {
            return None;
        }
        self.text.push_str(text);
        Some(StreamPart::TextDelta(text.to_string()))
    }

    fn push_tool_call(&mut self, position: usize, call: WireToolCall) -> StreamPart {
        match call {
            WireToolCall::Function {
                index,
                id,
                function,
            } => {
                let index = index.unwrap_or(position);
                let pending = self.tool_calls.entry(index).or_default();
                if id.is_some() {
                    pending.id = id.clone();
                }
                if let Some(name) = &function.name {
                    pending.name.push_str(name);
                }
                let arguments_delta = match function.arguments {
                    Some(Value::String(fragment)) => {
                        pending.arguments.push_str(&fragment);
                        fragment
                    }
                    Some(Value::Null) | None => String::new(),
                    Some(structured) => {
                        let text = structured.to_string();
                        pending.structured = Some(structured);
                        text
                    }
                };
                StreamPart::ToolCallDelta {
                    index,
                    id,
                    name: function.name,
                    arguments_delta,
                }
            }
            WireToolCall::Flat {
                id,
                name,
                arguments,
            } => {
                // next slot past the highest index seen, which may be sparse
                let index = self.tool_calls.keys().next_back().map_or(0, |last| last + 1);
                let arguments_delta = match &arguments {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self.tool_calls.insert(
                    index,
                    PendingToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                        structured: Some(arguments),
                    },
                );
                StreamPart::ToolCallDelta {
                    index,
                    id,
                    name: Some(name),
                    arguments_delta,
                }
            }
        }
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Close the aggregate into the canonical result
    pub fn finish(self) -> GenerateResult {
        let finish_reason = match self.finish_reason {
            Some(reason) => reason,
            None if self.saw_chat_chunk => FinishReason::Other,
            None => FinishReason::Stop,
        };

        GenerateResult {
            text: self.text,
            reasoning: non_empty(Some(self.reasoning)),
            tool_calls: self
                .tool_calls
                .into_values()
                .map(PendingToolCall::into_tool_call)
                .collect(),
            finish_reason,
            usage: self.terminal_usage.unwrap_or_default(),
        }
    }
}

/// Turn raw chunks into canonical deltas followed by one [`StreamPart::Finish`].
///
/// The returned stream is lazy: each poll pulls at most one raw chunk. The
/// first error ends it; nothing already yielded is retracted.
pub fn reconstruct(chunks: RawChunkStream) -> PartStream {
    Box::pin(async_stream::stream! {
        let mut chunks = chunks;
        let mut accumulator = StreamAccumulator::new();

        while let Some(chunk) = chunks.next().await {
            let parts = match chunk.and_then(|chunk| accumulator.fold(&chunk)) {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::warn!("Stream failed after {} characters: {}", accumulator.text().len(), e);
                    yield Err(e);
                    return;
                }
            };
            for part in parts {
                yield Ok(part);
            }
        }

        yield Ok(StreamPart::Finish(accumulator.finish()));
    })
}

/// End `stream` as soon as `token` is cancelled.
///
/// The inner stream (and with it the HTTP connection or binding stream) is
/// dropped before the single [`ProviderError::Cancelled`] is yielded.
pub fn with_cancellation(stream: PartStream, token: CancellationToken) -> PartStream {
    Box::pin(async_stream::stream! {
        let mut inner = stream;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                item = inner.next() => Some(item),
            };

            match next {
                Some(Some(item)) => {
                    yield item;
                }
                Some(None) => break,
                None => {
                    drop(inner);
                    yield Err(ProviderError::Cancelled);
                    break;
                }
            }
        }
    })
}

/// Drain a part stream and return its final aggregate
pub async fn collect_result(mut stream: PartStream) -> ProviderResult<GenerateResult> {
    while let Some(part) = stream.next().await {
        if let StreamPart::Finish(result) = part? {
            return Ok(result);
        }
    }
    Err(ProviderError::stream("Stream ended without a final result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_chunks() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(
            acc.fold(&json!({ "response": "Hel" })).unwrap(),
            vec![StreamPart::TextDelta("Hel".to_string())]
        );
        assert_eq!(
            acc.fold(&json!({ "response": "lo" })).unwrap(),
            vec![StreamPart::TextDelta("lo".to_string())]
        );
        assert!(acc
            .fold(&json!({ "response": "", "usage": { "prompt_tokens": 4, "completion_tokens": 2 } }))
            .unwrap()
            .is_empty());

        let result = acc.finish();
        assert_eq!(result.text, "Hello");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.prompt_tokens, 4);
        assert_eq!(result.usage.completion_tokens, 2);
    }

    #[test]
    fn test_usage_only_counts_on_terminal_chunk() {
        let mut acc = StreamAccumulator::new();
        acc.fold(&json!({ "response": "a", "usage": { "prompt_tokens": 9, "completion_tokens": 9 } }))
            .unwrap();
        acc.fold(&json!({ "response": "b" })).unwrap();
        assert_eq!(acc.finish().usage, Usage::default());
    }

    #[test]
    fn test_reasoning_and_text_deltas_stay_apart() {
        let mut acc = StreamAccumulator::new();
        acc.fold(&json!({ "choices": [{ "delta": { "reasoning_content": "Okay, " } }] })).unwrap();
        acc.fold(&json!({ "choices": [{ "delta": { "reasoning_content": "thinking" } }] })).unwrap();
        let parts = acc
            .fold(&json!({ "choices": [{ "delta": { "content": "A cow" }, "finish_reason": "stop" }] }))
            .unwrap();
        assert_eq!(parts, vec![StreamPart::TextDelta("A cow".to_string())]);

        let result = acc.finish();
        assert_eq!(result.reasoning.as_deref(), Some("Okay, thinking"));
        assert_eq!(result.text, "A cow");
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_tool_call_fragments_assemble() {
        let mut acc = StreamAccumulator::new();
        acc.fold(&json!({ "choices": [{ "delta": { "tool_calls": [
            { "index": 0, "id": "call_1", "type": "function", "function": { "name": "get_weather", "arguments": "{\"ci" } }
        ] } }] }))
        .unwrap();
        let parts = acc
            .fold(&json!({ "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "function": { "arguments": "ty\":\"Oslo\"}" } }
            ] }, "finish_reason": "tool_calls" }] }))
            .unwrap();
        assert_eq!(
            parts,
            vec![StreamPart::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments_delta: "ty\":\"Oslo\"}".to_string(),
            }]
        );

        let result = acc.finish();
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(result.tool_calls[0].name, "get_weather");
        assert_eq!(result.tool_calls[0].arguments, json!("{\"city\":\"Oslo\"}"));
    }

    #[test]
    fn test_flat_call_after_sparse_index_keeps_both() {
        let mut acc = StreamAccumulator::new();
        acc.fold(&json!({ "choices": [{ "delta": { "tool_calls": [
            { "index": 1, "function": { "name": "first" } }
        ] } }] }))
        .unwrap();
        let parts = acc
            .fold(&json!({ "choices": [{ "delta": { "tool_calls": [
                { "name": "second", "arguments": { "q": 1 } }
            ] } }] }))
            .unwrap();
        assert!(matches!(
            parts.as_slice(),
            [StreamPart::ToolCallDelta { index: 2, .. }]
        ));

        let names: Vec<String> = acc.finish().tool_calls.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_one_chunk_can_carry_several_deltas() {
        let mut acc = StreamAccumulator::new();
        let parts = acc
            .fold(&json!({ "choices": [{ "delta": {
                "reasoning_content": "hmm",
                "content": "ok",
                "tool_calls": [
                    { "index": 0, "function": { "name": "a", "arguments": "{}" } },
                    { "index": 1, "function": { "name": "b", "arguments": "{}" } }
                ]
            } }] }))
            .unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], StreamPart::ReasoningDelta("hmm".to_string()));
        assert_eq!(parts[1], StreamPart::TextDelta("ok".to_string()));
        assert!(matches!(&parts[2], StreamPart::ToolCallDelta { index: 0, .. }));
        assert!(matches!(&parts[3], StreamPart::ToolCallDelta { index: 1, .. }));
        assert_eq!(acc.finish().tool_calls.len(), 2);
    }

    #[test]
    fn test_non_object_chunk_is_malformed() {
        let mut acc = StreamAccumulator::new();
        let err = acc.fold(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ProviderError::Stream { .. }));
    }

    #[test]
    fn test_unknown_object_contributes_nothing() {
        let mut acc = StreamAccumulator::new();
        assert!(acc.fold(&json!({ "p": "abcdef" })).unwrap().is_empty());
        assert_eq!(acc.finish(), GenerateResult::text(""));
    }
}
