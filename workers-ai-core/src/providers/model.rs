//! Provider factory and model handles

use crate::binding::{Binding, BindingTransport};
use crate::config::RestConfig;
use crate::http::RestTransport;
use crate::protocol::{CallOptions, GenerateResult, Prompt};
use crate::providers::adapter::{LanguageModel, PartStream, TransportClient, TransportKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::normalize::normalize;
use crate::providers::options::{coerce, CoercedSettings, Settings};
use crate::providers::request::build_request;
use crate::providers::streaming::{reconstruct, with_cancellation};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How the provider reaches Workers AI
#[derive(Clone)]
pub enum ProviderSettings {
    /// Account credentials for the public REST API
    Rest(RestConfig),
    /// Host binding for in-process calls
    Binding(Arc<dyn Binding>),
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSettings::Rest(config) => f.debug_tuple("Rest").field(config).finish(),
            ProviderSettings::Binding(_) => f.write_str("Binding(..)"),
        }
    }
}

impl From<RestConfig> for ProviderSettings {
    fn from(config: RestConfig) -> Self {
        ProviderSettings::Rest(config)
    }
}

impl From<Arc<dyn Binding>> for ProviderSettings {
    fn from(binding: Arc<dyn Binding>) -> Self {
        ProviderSettings::Binding(binding)
    }
}

/// Workers AI provider; hands out [`WorkersAiModel`]s sharing one transport
#[derive(Debug, Clone)]
pub struct WorkersAi {
    transport: Arc<dyn TransportClient>,
}

impl WorkersAi {
    /// Create a provider for the given transport settings
    pub fn new(settings: ProviderSettings) -> ProviderResult<Self> {
        let transport: Arc<dyn TransportClient> = match settings {
            ProviderSettings::Rest(config) => Arc::new(RestTransport::new(&config)?),
            ProviderSettings::Binding(binding) => Arc::new(BindingTransport::new(binding)),
        };
        Ok(Self { transport })
    }

    /// REST provider configured from the `CLOUDFLARE_*` environment variables
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ProviderSettings::Rest(RestConfig::from_env()?))
    }

    /// Use a custom transport (tests, proxies)
    pub fn with_transport(transport: Arc<dyn TransportClient>) -> Self {
        Self { transport }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Create a handle for `model_id`.
    ///
    /// Passthrough settings are coerced for the active transport here, so a
    /// value the transport cannot carry fails before any call is made.
    pub fn model(
        &self,
        model_id: impl Into<String>,
        settings: Option<Settings>,
    ) -> ProviderResult<WorkersAiModel> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(ProviderError::Configuration("model id must not be empty".to_string()));
        }

        let settings = match settings {
            Some(settings) => coerce(&settings, self.transport.kind().target_shape())?,
            None => CoercedSettings::default(),
        };
        debug!("Created model handle for {} ({:?})", model_id, self.transport.kind());

        Ok(WorkersAiModel {
            model_id,
            settings,
            transport: Arc::clone(&self.transport),
        })
    }
}

/// Handle bound to one model id and its passthrough settings
#[derive(Debug, Clone)]
pub struct WorkersAiModel {
    model_id: String,
    settings: CoercedSettings,
    transport: Arc<dyn TransportClient>,
}

impl WorkersAiModel {
    /// Settings after coercion for the active transport
    pub fn settings(&self) -> &CoercedSettings {
        &self.settings
    }
}

/// Race `call` against `token`, if one was given
async fn cancellable<T>(
    token: Option<&CancellationToken>,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ProviderError::Cancelled),
            result = call => result,
        },
        None => call.await,
    }
}

#[async_trait]
impl LanguageModel for WorkersAiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: Prompt, options: CallOptions) -> ProviderResult<GenerateResult> {
        info!("Generating with {} via {}", self.model_id, self.provider_name());
        let request = build_request(&self.model_id, &prompt, &options, self.settings.clone(), false);

        let raw = cancellable(options.cancellation.as_ref(), self.transport.send(&request)).await?;
        normalize(&raw)
    }

    async fn stream(&self, prompt: Prompt, options: CallOptions) -> ProviderResult<PartStream> {
        info!("Streaming with {} via {}", self.model_id, self.provider_name());
        let request = build_request(&self.model_id, &prompt, &options, self.settings.clone(), true);

        let chunks =
            cancellable(options.cancellation.as_ref(), self.transport.send_stream(&request)).await?;
        let parts = reconstruct(chunks);

        Ok(match options.cancellation {
            Some(token) => with_cancellation(parts, token),
            None => parts,
        })
    }
}
