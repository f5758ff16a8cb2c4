//! Backend adapters: one per provider, each owning its HTTP client, health
//! score, and fixed-window counters.

mod anthropic;
mod gemini;
mod minimax;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use minimax::MiniMaxAdapter;

use crate::error::{BackendError, RelayError};
use crate::types::{Backend, ChatParams, ChatResult, RateWindowSnapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Default generation budget when neither the request nor the route says.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 300;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Contract every backend adapter satisfies.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn id(&self) -> Backend;

    /// Issue one backend call under a hard deadline. On success the adapter
    /// has already counted the request and raised its health; on failure it
    /// has lowered its health and classified the error. Dropping the
    /// returned future cancels the in-flight HTTP call.
    async fn chat(&self, params: &ChatParams) -> Result<ChatResult, BackendError>;

    /// Credentials configured and health above the threshold.
    fn is_available(&self) -> bool;

    fn rate_limit_info(&self) -> RateWindowSnapshot;

    /// Soft-ceiling cost estimate in USD for this request. A chars/4
    /// heuristic against published pricing, not an exact tokenizer.
    fn estimate_cost(&self, params: &ChatParams) -> f64;

    fn health_score(&self) -> u32;
}

/// Per-adapter construction parameters.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub api_key: String,
    /// Override the provider endpoint, mainly for tests.
    pub base_url: Option<String>,
    /// Provider-default deadline when the request carries none.
    pub timeout: Duration,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl AdapterConfig {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Published per-1M-token prices for one backend's model.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Pricing {
    /// `(input_chars/4) * input_price + max_output_tokens * output_price`.
    pub fn estimate(&self, params: &ChatParams, default_max_tokens: u32) -> f64 {
        let input_tokens = (params.query.len() + params.system_prompt.len()) as f64 / 4.0;
        let output_tokens = f64::from(params.max_output_tokens.unwrap_or(default_max_tokens));
        (input_tokens * self.input_per_mtok + output_tokens * self.output_per_mtok) / 1_000_000.0
    }
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, RelayError> {
    // No client-level total timeout: the per-call deadline bounds the whole
    // exchange, and a client cap would silently truncate longer deadlines.
    Ok(reqwest::ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

/// Send a prepared request under `deadline` and return the parsed JSON body.
/// The deadline covers the whole exchange, headers and body both. Maps
/// timeouts, transport errors, and non-success statuses into the failure
/// taxonomy; callers pick the payload apart themselves.
pub(crate) async fn send_chat_request(
    backend: Backend,
    request: reqwest::RequestBuilder,
    deadline: Duration,
) -> Result<Value, BackendError> {
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::network(backend, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            BackendError::network(backend, format!("failed to read response: {e}"))
        })?;
        Ok::<_, BackendError>((status, body))
    };

    let (status, body) = timeout(deadline, exchange)
        .await
        .map_err(|_| BackendError::timeout(backend, deadline.as_millis() as u64))??;

    if !(200..300).contains(&status) {
        return Err(BackendError::api(backend, status, truncate(&body, 500)));
    }

    serde_json::from_str(&body)
        .map_err(|e| BackendError::malformed(backend, format!("invalid JSON response: {e}")))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

/// Long-lived adapter set, built once at startup from configuration and
/// passed explicitly to the dispatcher.
#[derive(Default)]
pub struct BackendRegistry {
    adapters: HashMap<Backend, Arc<dyn BackendAdapter>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, adapter: Arc<dyn BackendAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, backend: Backend) -> Option<&Arc<dyn BackendAdapter>> {
        self.adapters.get(&backend)
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.adapters.contains_key(&backend)
    }

    /// Configured backends in declaration order.
    pub fn configured(&self) -> Vec<Backend> {
        Backend::ALL
            .iter()
            .copied()
            .filter(|b| self.adapters.contains_key(b))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Backend, &Arc<dyn BackendAdapter>)> {
        // Declaration order keeps iteration deterministic.
        Backend::ALL
            .iter()
            .filter_map(|b| self.adapters.get(b).map(|a| (*b, a)))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
