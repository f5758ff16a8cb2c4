//! Environment-driven configuration.
//!
//! The configured backend set is decided once here: a backend exists for the
//! process lifetime iff its credential is present at startup. Missing
//! credentials are a configuration fact, not a per-call error.

use crate::backends::{
    AdapterConfig, AnthropicAdapter, BackendRegistry, GeminiAdapter, MiniMaxAdapter,
};
use crate::error::{RelayError, Result};
use crate::quota::QuotaLedger;
#[cfg(feature = "redis")]
use crate::quota::SharedQuotaStore;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub minimax_api_key: Option<String>,
    /// Shared quota tier; absent means local-only accounting.
    pub redis_url: Option<String>,
    /// Endpoint overrides, mainly for tests.
    pub gemini_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub minimax_base_url: Option<String>,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            minimax_api_key: non_empty_var("MINIMAX_API_KEY"),
            redis_url: non_empty_var("REDIS_URL"),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL"),
            anthropic_base_url: non_empty_var("ANTHROPIC_BASE_URL"),
            minimax_base_url: non_empty_var("MINIMAX_BASE_URL"),
        }
    }

    /// Build the adapter registry from whichever credentials are present.
    /// Zero credentials is a configuration error.
    pub fn build_registry(&self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();

        if let Some(key) = &self.gemini_api_key {
            let mut config = AdapterConfig::new(key, GeminiAdapter::DEFAULT_TIMEOUT);
            config.base_url = self.gemini_base_url.clone();
            registry.insert(Arc::new(GeminiAdapter::new(config)?));
        }

        if let Some(key) = &self.anthropic_api_key {
            let mut config = AdapterConfig::new(key, AnthropicAdapter::DEFAULT_TIMEOUT);
            config.base_url = self.anthropic_base_url.clone();
            registry.insert(Arc::new(AnthropicAdapter::new(config)?));
        }

        if let Some(key) = &self.minimax_api_key {
            let mut config = AdapterConfig::new(key, MiniMaxAdapter::DEFAULT_TIMEOUT);
            config.base_url = self.minimax_base_url.clone();
            registry.insert(Arc::new(MiniMaxAdapter::new(config)?));
        }

        if registry.is_empty() {
            return Err(RelayError::Config(
                "no backend credentials configured".to_string(),
            ));
        }

        info!(backends = ?registry.configured(), "backend registry initialized");
        Ok(registry)
    }

    /// Build the quota ledger, attaching the shared tier when Redis is
    /// configured and reachable. An unreachable Redis degrades to local-only
    /// accounting rather than failing startup.
    pub async fn build_ledger(&self) -> QuotaLedger {
        #[cfg(feature = "redis")]
        if let Some(url) = &self.redis_url {
            match SharedQuotaStore::connect(url).await {
                Ok(shared) => return QuotaLedger::new().with_shared(shared),
                Err(err) => {
                    warn!(error = %err, "shared quota store unreachable, using local tier only");
                }
            }
        }
        QuotaLedger::new()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
