//! Transport and language model traits
//!
//! A provider reaches Workers AI through exactly one [`TransportClient`],
//! chosen when the provider is created. Model handles talk only to this trait.

use crate::protocol::{CallOptions, GenerateResult, Prompt, StreamPart};
use crate::providers::error::ProviderResult;
use crate::providers::options::TargetShape;
use crate::providers::request::OutboundRequest;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Raw JSON chunks in arrival order, as produced by a transport
pub type RawChunkStream = Pin<Box<dyn Stream<Item = ProviderResult<Value>> + Send>>;

/// Canonical stream parts handed to the caller
pub type PartStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamPart>> + Send>>;

/// Which transport a client implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Rest,
    Binding,
}

impl TransportKind {
    /// Settings shape this transport accepts
    pub fn target_shape(&self) -> TargetShape {
        match self {
            TransportKind::Rest => TargetShape::StringValues,
            TransportKind::Binding => TargetShape::Structured,
        }
    }
}

/// Core transport trait shared by the REST and binding clients
#[async_trait]
pub trait TransportClient: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Run a non-streaming request and return the raw upstream response
    async fn send(&self, request: &OutboundRequest) -> ProviderResult<Value>;

    /// Run a streaming request and return the raw chunks
    async fn send_stream(&self, request: &OutboundRequest) -> ProviderResult<RawChunkStream>;
}

/// Caller-facing model contract
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name for logging
    fn provider_name(&self) -> &'static str {
        "workers-ai"
    }

    /// Model identifier this handle is bound to
    fn model_id(&self) -> &str;

    /// Generate a complete result
    async fn generate(&self, prompt: Prompt, options: CallOptions) -> ProviderResult<GenerateResult>;

    /// Generate incrementally; the stream ends with [`StreamPart::Finish`]
    async fn stream(&self, prompt: Prompt, options: CallOptions) -> ProviderResult<PartStream>;
}

impl std::fmt::Debug for dyn TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportClient({:?})", self.kind())
    }
}

