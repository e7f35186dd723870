//! Stream reconstruction tests

use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use workers_ai_core::providers::streaming::decode_event_stream;
use workers_ai_core::providers::{
    collect_result, normalize, reconstruct, with_cancellation, ProviderError, ProviderResult,
    RawChunkStream,
};
use workers_ai_core::{FinishReason, StreamPart};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn chunks(items: Vec<ProviderResult<Value>>) -> RawChunkStream {
    Box::pin(futures::stream::iter(items))
}

fn sse(frames: &[&str]) -> RawChunkStream {
    let bytes: Vec<Result<String, Infallible>> = frames.iter().map(|f| Ok(f.to_string())).collect();
    decode_event_stream(futures::stream::iter(bytes))
}

fn text_deltas(parts: &[ProviderResult<StreamPart>]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|p| match p {
            Ok(StreamPart::TextDelta(t)) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_text_deltas_match_non_streaming_text() {
    init_tracing();

    let words = ["A", " cow", " says", " moo", "."];
    let mut raw: Vec<ProviderResult<Value>> = words.iter().map(|w| Ok(json!({ "response": w }))).collect();
    raw.push(Ok(json!({
        "response": "",
        "usage": { "prompt_tokens": 7, "completion_tokens": 5, "total_tokens": 12 }
    })));

    let parts: Vec<_> = reconstruct(chunks(raw)).collect().await;

    // N deltas plus the final aggregate
    assert_eq!(parts.len(), words.len() + 1);
    let deltas = text_deltas(&parts);
    assert_eq!(deltas, words.iter().map(|w| w.to_string()).collect::<Vec<_>>());

    let non_streaming = normalize(&json!({ "response": words.concat() })).unwrap();
    match parts.last() {
        Some(Ok(StreamPart::Finish(result))) => {
            assert_eq!(result.text, deltas.concat());
            assert_eq!(result.text, non_streaming.text);
            assert_eq!(result.finish_reason, FinishReason::Stop);
            assert_eq!(result.usage.prompt_tokens, 7);
            assert_eq!(result.usage.completion_tokens, 5);
        }
        other => panic!("Expected a final result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_chunks_with_reasoning() {
    let raw = vec![
        Ok(json!({ "choices": [{ "delta": { "reasoning_content": "Think" } }] })),
        Ok(json!({ "choices": [{ "delta": { "content": "Answer" } }] })),
        Ok(json!({ "choices": [{ "delta": {}, "finish_reason": "length" }] })),
        Ok(json!({ "choices": [], "usage": { "prompt_tokens": 3, "completion_tokens": 2 } })),
    ];

    let result = collect_result(reconstruct(chunks(raw))).await.unwrap();
    assert_eq!(result.text, "Answer");
    assert_eq!(result.reasoning.as_deref(), Some("Think"));
    assert_eq!(result.finish_reason, FinishReason::Length);
    assert_eq!(result.usage.total_tokens(), 5);
}

#[tokio::test]
async fn test_null_usage_counts_do_not_end_the_stream() {
    let loose_usage = json!({ "prompt_tokens": null, "completion_tokens": 2, "total_tokens": null });
    let chat = vec![Ok(json!({
        "choices": [{ "message": { "content": "x" }, "finish_reason": "stop" }],
        "usage": loose_usage.clone()
    }))];
    let native = vec![
        Ok(json!({ "response": "x" })),
        Ok(json!({ "response": "", "usage": loose_usage })),
    ];

    for raw in [chat, native] {
        let result = collect_result(reconstruct(chunks(raw))).await.unwrap();
        assert_eq!(result.text, "x");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.prompt_tokens, 0);
        assert_eq!(result.usage.completion_tokens, 2);
    }
}

#[tokio::test]
async fn test_undecodable_tool_call_chunk_keeps_streaming() {
    let raw = vec![
        Ok(json!({ "choices": [{ "delta": { "content": "hi", "tool_calls": [{ "id": "c1", "type": "function" }] } }] })),
        Ok(json!({ "choices": [{ "delta": {}, "finish_reason": "stop" }] })),
    ];

    let result = collect_result(reconstruct(chunks(raw))).await.unwrap();
    assert_eq!(result.text, "hi");
    assert!(result.tool_calls.is_empty());
}

#[tokio::test]
async fn test_error_mid_stream_ends_after_one_error() {
    let raw = vec![
        Ok(json!({ "response": "partial" })),
        Err(ProviderError::stream("connection reset")),
        Ok(json!({ "response": "never seen" })),
    ];

    let parts: Vec<_> = reconstruct(chunks(raw)).collect().await;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].as_ref().unwrap(), &StreamPart::TextDelta("partial".to_string()));
    assert!(matches!(parts[1], Err(ProviderError::Stream { .. })));
}

#[tokio::test]
async fn test_event_stream_decoding() {
    // The second event is split across two reads
    let stream = sse(&[
        "data: {\"response\":\"Hel\"}\n\n",
        "data: {\"respo",
        "nse\":\"lo\"}\n\n",
        "data: [DONE]\n\n",
        "data: {\"response\":\"ignored\"}\n\n",
    ]);

    let result = collect_result(reconstruct(stream)).await.unwrap();
    assert_eq!(result.text, "Hello");
}

#[tokio::test]
async fn test_event_stream_without_done_ends_normally() {
    let stream = sse(&["data: {\"response\":\"Hi\"}\n\n", ": keep-alive\n\n"]);

    let result = collect_result(reconstruct(stream)).await.unwrap();
    assert_eq!(result.text, "Hi");
}

#[tokio::test]
async fn test_malformed_event_data() {
    let stream = sse(&["data: {\"response\":\"ok\"}\n\n", "data: {not json\n\n"]);

    let parts: Vec<_> = reconstruct(stream).collect().await;
    assert_eq!(text_deltas(&parts), vec!["ok".to_string()]);
    match parts.last() {
        Some(Err(ProviderError::Stream { message })) => assert!(message.contains("Malformed chunk")),
        other => panic!("Expected a stream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_stops_a_stalled_stream() {
    let token = CancellationToken::new();
    let stalled: RawChunkStream = Box::pin(
        futures::stream::iter(vec![Ok::<_, ProviderError>(json!({ "response": "first" }))])
            .chain(futures::stream::pending()),
    );

    let mut parts = with_cancellation(reconstruct(stalled), token.clone());
    assert_eq!(
        parts.next().await.unwrap().unwrap(),
        StreamPart::TextDelta("first".to_string())
    );

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    assert!(matches!(parts.next().await, Some(Err(ProviderError::Cancelled))));
    assert!(parts.next().await.is_none());
    canceller.await.unwrap();
}

#[test]
fn test_empty_source_still_finishes() {
    let result = tokio_test::block_on(collect_result(reconstruct(chunks(vec![])))).unwrap();
    assert_eq!(result.text, "");
    assert_eq!(result.finish_reason, FinishReason::Stop);
}
