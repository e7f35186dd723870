//! REST transport implementation using reqwest

use crate::config::{RestConfig, SecretString};
use crate::http::error::{extract_error_message, map_http_error};
use crate::providers::adapter::{RawChunkStream, TransportClient, TransportKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::options::{coerce, CoercedSettings, TargetShape};
use crate::providers::request::OutboundRequest;
use crate::providers::streaming::decode_event_stream;
use crate::providers::types::top_level_keys;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Default user agent
const USER_AGENT: &str = concat!("workers-ai-core/", env!("CARGO_PKG_VERSION"));

/// Transport that calls `POST {base_url}/accounts/{account_id}/ai/run/{model}`
#[derive(Debug, Clone)]
pub struct RestTransport {
    /// The underlying reqwest client (pooled, cheap to clone)
    client: Client,
    base_url: String,
    account_id: String,
    api_key: SecretString,
    timeout: Duration,
    /// Maximum non-streaming response size to prevent OOM
    max_response_size: usize,
}

impl RestTransport {
    /// Create a transport with its own connection pool
    pub fn new(config: &RestConfig) -> ProviderResult<Self> {
        config.validate().map_err(crate::config::ConfigError::from)?;

        // Timeouts are per request so streams can outlive `timeout_secs`
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(config, client))
    }

    /// Create a transport that shares an existing reqwest client
    pub fn with_client(config: &RestConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_response_size: config.max_response_bytes,
        }
    }

    /// Build the run URL for a model, with settings as query parameters.
    ///
    /// Empty values are left out of the query string.
    pub fn build_url(&self, model_id: &str, settings: &CoercedSettings) -> ProviderResult<Url> {
        let raw = format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, model_id
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| ProviderError::Configuration(format!("Invalid run URL '{}': {}", raw, e)))?;

        let pairs = match settings {
            CoercedSettings::Query(pairs) => pairs.clone(),
            CoercedSettings::Structured(settings) => {
                match coerce(settings, TargetShape::StringValues)? {
                    CoercedSettings::Query(pairs) => pairs,
                    CoercedSettings::Structured(_) => Vec::new(),
                }
            }
        };

        let mut pairs = pairs.into_iter().filter(|(_, v)| !v.is_empty()).peekable();
        if pairs.peek().is_some() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        Ok(url)
    }

    fn prepare(&self, url: Url, request: &OutboundRequest, request_id: Uuid) -> RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .header("X-Request-ID", request_id.to_string())
            .json(&request.payload)
    }

    async fn dispatch(
        &self,
        builder: RequestBuilder,
        model_id: &str,
        request_id: Uuid,
    ) -> ProviderResult<Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Request timeout for {} [request_id: {}]", model_id, request_id);
            } else {
                error!("Request error for {} [request_id: {}]: {}", model_id, request_id, e);
            }
            let mut err = ProviderError::from(e);
            if let ProviderError::Transport { message, .. } = &mut err {
                message.push_str(&format!(" [request_id: {}]", request_id));
            }
            err
        })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(
                "Request failed with status {} for {} [request_id: {}]",
                status, model_id, request_id
            );
            return Err(map_http_error(status, body, request_id));
        }

        Ok(response)
    }

    fn check_content_length(&self, response: &Response, request_id: Uuid) -> ProviderResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(self.too_large(content_length as usize, request_id));
            }
        }
        Ok(())
    }

    fn too_large(&self, size: usize, request_id: Uuid) -> ProviderError {
        ProviderError::transport(format!(
            "Response size {} exceeds maximum {} [request_id: {}]",
            size, self.max_response_size, request_id
        ))
    }
}

/// Unwrap the `{ "result": ..., "success": ..., "errors": [...] }` envelope
fn unwrap_envelope(envelope: Value, request_id: Uuid) -> ProviderResult<Value> {
    if envelope.get("success").and_then(Value::as_bool) == Some(false) {
        let message = extract_error_message(&envelope)
            .unwrap_or_else(|| "Request was not successful".to_string());
        return Err(ProviderError::Transport {
            status: None,
            message: format!("{} [request_id: {}]", message, request_id),
            body: Some(envelope.to_string()),
        });
    }

    match envelope {
        Value::Object(mut map) => match map.remove("result") {
            Some(result) if !result.is_null() => Ok(result),
            _ => Err(ProviderError::Normalization {
                keys: map.keys().cloned().collect(),
            }),
        },
        other => Err(ProviderError::Normalization {
            keys: top_level_keys(&other),
        }),
    }
}

#[async_trait]
impl TransportClient for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn send(&self, request: &OutboundRequest) -> ProviderResult<Value> {
        let request_id = Uuid::new_v4();
        info!(
            "Executing Workers AI request for {} [request_id: {}]",
            request.model_id, request_id
        );

        let url = self.build_url(&request.model_id, &request.settings)?;
        debug!("Request URL: {}", url);

        let builder = self.prepare(url, request, request_id).timeout(self.timeout);
        let response = self.dispatch(builder, &request.model_id, request_id).await?;

        self.check_content_length(&response, request_id)?;

        let bytes = response.bytes().await.map_err(|e| {
            ProviderError::transport(format!(
                "Failed to read response body: {} [request_id: {}]",
                e, request_id
            ))
        })?;

        if bytes.len() > self.max_response_size {
            return Err(self.too_large(bytes.len(), request_id));
        }

        let envelope: Value = serde_json::from_slice(&bytes).map_err(|e| {
            error!(
                "Failed to parse response from {} [request_id: {}]: {}",
                request.model_id, request_id, e
            );
            ProviderError::Transport {
                status: None,
                message: format!("Invalid JSON response: {} [request_id: {}]", e, request_id),
                body: Some(String::from_utf8_lossy(&bytes).into_owned()),
            }
        })?;

        let result = unwrap_envelope(envelope, request_id)?;
        info!(
            "Request completed successfully for {} [request_id: {}]",
            request.model_id, request_id
        );
        Ok(result)
    }

    async fn send_stream(&self, request: &OutboundRequest) -> ProviderResult<RawChunkStream> {
        let request_id = Uuid::new_v4();
        info!(
            "Opening Workers AI stream for {} [request_id: {}]",
            request.model_id, request_id
        );

        let url = self.build_url(&request.model_id, &request.settings)?;
        debug!("Request URL: {}", url);

        let builder = self
            .prepare(url, request, request_id)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = self.dispatch(builder, &request.model_id, request_id).await?;

        Ok(decode_event_stream(response.bytes_stream()))
    }
}
