//! Workers AI provider core
//!
//! Exposes Workers AI text generation as a [`LanguageModel`], reachable over
//! the public REST API or through an in-process host [`Binding`].
//!
//! ```no_run
//! use workers_ai_core::{LanguageModel, ProviderSettings, RestConfig, WorkersAi};
//!
//! # async fn run() -> workers_ai_core::ProviderResult<()> {
//! let provider = WorkersAi::new(ProviderSettings::Rest(RestConfig::new("account", "token")))?;
//! let model = provider.model("@cf/meta/llama-3.1-8b-instruct", None)?;
//! let result = model.generate("Write a greeting".into(), Default::default()).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod http;
pub mod protocol;
pub mod providers;

pub use binding::{binding_fn, Binding, BindingOutput, BindingTransport};
pub use config::{RestConfig, SecretString};
pub use http::RestTransport;
pub use protocol::{
    CallOptions, FinishReason, GenerateResult, Message, MessageRole, Prompt, ResponseFormat,
    StreamPart, ToolCall, ToolDefinition, Usage,
};
pub use providers::{
    ErrorKind, LanguageModel, PartStream, ProviderError, ProviderResult, ProviderSettings,
    SettingValue, Settings, TransportClient, WorkersAi, WorkersAiModel,
};

/// Returns the version of the library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
