//! Workers AI language model adapter
//!
//! Call flow: settings are coerced when a model handle is created, each call
//! builds an [`OutboundRequest`], the chosen [`TransportClient`] runs it, and
//! the raw result is normalized (or folded chunk by chunk when streaming).

pub mod adapter;
pub mod error;
pub mod model;
pub mod normalize;
pub mod options;
pub mod request;
pub mod streaming;
pub mod types;

pub use adapter::{LanguageModel, PartStream, RawChunkStream, TransportClient, TransportKind};
pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use model::{ProviderSettings, WorkersAi, WorkersAiModel};
pub use normalize::normalize;
pub use options::{coerce, CoercedSettings, SettingValue, Settings, TargetShape};
pub use request::{build_request, OutboundRequest};
pub use streaming::{collect_result, reconstruct, with_cancellation, StreamAccumulator};
