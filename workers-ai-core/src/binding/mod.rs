//! In-process transport through a host-supplied binding
//!
//! The host implements [`Binding`] (typically a thin wrapper around the
//! runtime's AI object). Requests never leave the process through this crate;
//! the binding decides how the model is reached.

use crate::providers::adapter::{RawChunkStream, TransportClient, TransportKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::options::{CoercedSettings, SettingValue, Settings};
use crate::providers::request::OutboundRequest;
use crate::providers::streaming::{decode_event_stream, single_chunk};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stream of decoded JSON chunks handed back by a binding
pub type BindingChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<Value>> + Send>>;

/// Stream of raw Server-Sent Event bytes handed back by a binding
pub type BindingByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// What a binding returns for one run
pub enum BindingOutput {
    /// A complete response object
    Response(Value),
    /// Already-decoded chunks, in arrival order
    Chunks(BindingChunkStream),
    /// An SSE body, decoded the same way as the REST stream
    EventStream(BindingByteStream),
}

impl BindingOutput {
    fn describe(&self) -> &'static str {
        match self {
            BindingOutput::Response(_) => "response",
            BindingOutput::Chunks(_) => "chunk stream",
            BindingOutput::EventStream(_) => "event stream",
        }
    }
}

impl fmt::Debug for BindingOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingOutput::Response(value) => f.debug_tuple("Response").field(value).finish(),
            other => write!(f, "BindingOutput({})", other.describe()),
        }
    }
}

impl From<Value> for BindingOutput {
    fn from(value: Value) -> Self {
        BindingOutput::Response(value)
    }
}

/// Host-supplied AI binding
#[async_trait]
pub trait Binding: Send + Sync {
    /// Run `model` with the JSON `inputs` and the passthrough `options`
    async fn run(&self, model: &str, inputs: Value, options: &Settings) -> anyhow::Result<BindingOutput>;
}

type RunFn = dyn Fn(String, Value, Settings) -> BoxFuture<'static, anyhow::Result<BindingOutput>>
    + Send
    + Sync;

/// [`Binding`] backed by a closure
pub struct FnBinding {
    run: Box<RunFn>,
}

impl fmt::Debug for FnBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnBinding")
    }
}

#[async_trait]
impl Binding for FnBinding {
    async fn run(&self, model: &str, inputs: Value, options: &Settings) -> anyhow::Result<BindingOutput> {
        (self.run)(model.to_string(), inputs, options.clone()).await
    }
}

/// Wrap an async closure as a [`Binding`]
///
/// ```ignore
/// let binding = binding_fn(|_model, _inputs, _options| async move {
///     Ok(serde_json::json!({ "response": "Hello" }).into())
/// });
/// ```
pub fn binding_fn<F, Fut>(f: F) -> Arc<dyn Binding>
where
    F: Fn(String, Value, Settings) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<BindingOutput>> + Send + 'static,
{
    Arc::new(FnBinding {
        run: Box::new(move |model, inputs, options| f(model, inputs, options).boxed()),
    })
}

/// Transport that calls the host binding directly
#[derive(Clone)]
pub struct BindingTransport {
    binding: Arc<dyn Binding>,
}

impl fmt::Debug for BindingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTransport").finish_non_exhaustive()
    }
}

impl BindingTransport {
    pub fn new(binding: Arc<dyn Binding>) -> Self {
        Self { binding }
    }

    async fn run(&self, request: &OutboundRequest, request_id: Uuid) -> ProviderResult<BindingOutput> {
        let options = structured_settings(&request.settings);
        self.binding
            .run(&request.model_id, request.payload.clone(), &options)
            .await
            .map_err(|e| {
                warn!(
                    "Binding run failed for {} [request_id: {}]: {:#}",
                    request.model_id, request_id, e
                );
                ProviderError::transport(format!("Binding run failed: {:#} [request_id: {}]", e, request_id))
            })
    }
}

/// Settings as the binding receives them
fn structured_settings(settings: &CoercedSettings) -> Settings {
    match settings {
        CoercedSettings::Structured(settings) => settings.clone(),
        CoercedSettings::Query(pairs) => pairs
            .iter()
            .map(|(k, v)| (k.clone(), SettingValue::String(v.clone())))
            .collect(),
    }
}

#[async_trait]
impl TransportClient for BindingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Binding
    }

    async fn send(&self, request: &OutboundRequest) -> ProviderResult<Value> {
        let request_id = Uuid::new_v4();
        info!(
            "Running {} through the binding [request_id: {}]",
            request.model_id, request_id
        );

        match self.run(request, request_id).await? {
            BindingOutput::Response(value) => {
                debug!("Binding run completed [request_id: {}]", request_id);
                Ok(value)
            }
            other => Err(ProviderError::transport(format!(
                "Binding returned a {} for a non-streaming call [request_id: {}]",
                other.describe(),
                request_id
            ))),
        }
    }

    async fn send_stream(&self, request: &OutboundRequest) -> ProviderResult<RawChunkStream> {
        let request_id = Uuid::new_v4();
        info!(
            "Streaming {} through the binding [request_id: {}]",
            request.model_id, request_id
        );

        let output = self.run(request, request_id).await?;
        debug!("Binding returned a {} [request_id: {}]", output.describe(), request_id);

        Ok(match output {
            BindingOutput::Response(value) => single_chunk(value),
            BindingOutput::Chunks(chunks) => Box::pin(chunks.map(|chunk| {
                chunk.map_err(|e| ProviderError::stream(format!("Binding stream interrupted: {:#}", e)))
            })),
            BindingOutput::EventStream(bytes) => decode_event_stream(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::options::TargetShape;
    use serde_json::json;

    fn request(stream: bool) -> OutboundRequest {
        let mut payload = json!({ "prompt": "hi" });
        if stream {
            payload["stream"] = json!(true);
        }
        OutboundRequest {
            model_id: "@cf/test/model".to_string(),
            payload,
            settings: crate::providers::options::coerce(
                &Settings::from([("gateway".to_string(), json!({ "id": "gw" }).into())]),
                TargetShape::Structured,
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_send_returns_response() {
        let binding = binding_fn(|model, inputs, options| async move {
            assert_eq!(model, "@cf/test/model");
            assert_eq!(inputs, json!({ "prompt": "hi" }));
            assert_eq!(options["gateway"], SettingValue::Structured(json!({ "id": "gw" })));
            Ok(json!({ "response": "Hello" }).into())
        });

        let value = BindingTransport::new(binding).send(&request(false)).await.unwrap();
        assert_eq!(value, json!({ "response": "Hello" }));
    }

    #[tokio::test]
    async fn test_send_rejects_stream_output() {
        let binding = binding_fn(|_, _, _| async move {
            let chunks: BindingChunkStream = Box::pin(futures::stream::empty::<anyhow::Result<Value>>());
            Ok(BindingOutput::Chunks(chunks))
        });

        let err = BindingTransport::new(binding).send(&request(false)).await.unwrap_err();
        assert!(err.to_string().contains("chunk stream"));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_binding_failure_is_transport_error() {
        let binding = binding_fn(|_, _, _| async move { Err(anyhow::anyhow!("model not found")) });

        let err = BindingTransport::new(binding).send(&request(false)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport { status: None, .. }));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_send_stream_wraps_single_response() {
        let binding = binding_fn(|_, _, _| async move { Ok(json!({ "response": "Hello" }).into()) });

        let chunks: Vec<_> = BindingTransport::new(binding)
            .send_stream(&request(true))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &json!({ "response": "Hello" }));
    }
}
