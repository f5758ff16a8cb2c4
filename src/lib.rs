//! # llm-relay
//!
//! Request-routing core that dispatches a chat-completion request to one of
//! several interchangeable LLM backends, tracks each backend's health and
//! quota, and transparently fails over when a backend is unavailable,
//! rate-limited, or erroring.
//!
//! ## Design
//!
//! - **Backend adapters** (Gemini, Anthropic, MiniMax) issue the provider
//!   call under a hard deadline, classify failures, and maintain their own
//!   health score and fixed-window request counters.
//! - **Fallback chains** are selected per traffic origin by a
//!   [`RoutingStrategy`]; the `Adaptive` strategy re-sorts backends by
//!   current health on every call.
//! - **Quota** is accounted locally in a rolling 24 h ledger, with an
//!   optional best-effort Redis tier for approximate cross-instance
//!   visibility. Limits are advisory gates, not hard admission control.
//! - The [`Dispatcher`] tries candidates strictly in order and returns the
//!   first success; only total exhaustion surfaces an error, which
//!   enumerates every attempted backend with its distinct reason.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use llm_relay::{ChatParams, Relay, Route, RoutingStrategy};
//!
//! #[tokio::main]
//! async fn main() -> llm_relay::Result<()> {
//!     // Reads GEMINI_API_KEY / ANTHROPIC_API_KEY / MINIMAX_API_KEY and
//!     // an optional REDIS_URL for the shared quota tier.
//!     let relay = Relay::from_env().await?;
//!
//!     let route = Route {
//!         model_tier: "flash".to_string(),
//!         timeout_ms: 8_000,
//!         system_prompt_template: "You are a helpful assistant.".to_string(),
//!     };
//!
//!     let response = relay
//!         .chat(
//!             &ChatParams::new("When is the next class?"),
//!             &route,
//!             RoutingStrategy::Web,
//!         )
//!         .await?;
//!
//!     println!("{} answered: {}", response.backend, response.result.content);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod backends;
pub mod config;
pub mod error;
pub mod health;
pub mod quota;
pub mod rate_limit;
pub mod router;
pub mod types;

pub use backends::{
    AdapterConfig, AnthropicAdapter, BackendAdapter, BackendRegistry, GeminiAdapter, MiniMaxAdapter,
};
pub use config::RelayConfig;
pub use error::{
    Attempt, AttemptLog, AttemptOutcome, BackendError, BackendErrorKind, RelayError, Result,
};
pub use health::HealthTracker;
#[cfg(feature = "redis")]
pub use quota::SharedQuotaStore;
pub use quota::{QuotaLedger, QuotaLimits, QuotaStats};
pub use rate_limit::{RateCaps, RateWindow};
pub use router::{Dispatcher, FallbackChain, RoutingStrategy};
pub use types::{
    Backend, BackendStatus, ChatParams, ChatResult, ConversationMessage, RateWindowSnapshot, Role,
    Route, RoutedResponse,
};

use std::sync::Arc;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// A ready-to-use relay: adapter registry, quota ledger, and dispatcher
/// built once and shared.
pub struct Relay {
    dispatcher: Dispatcher,
}

impl Relay {
    /// Build from environment variables. Fails when no backend credential
    /// is present; an unreachable shared quota store degrades to local-only
    /// accounting.
    pub async fn from_env() -> Result<Self> {
        let config = RelayConfig::from_env();
        let registry = config.build_registry()?;
        let ledger = config.build_ledger().await;
        Ok(Self::new(registry, ledger))
    }

    pub fn new(registry: BackendRegistry, ledger: QuotaLedger) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::new(registry), Arc::new(ledger)),
        }
    }

    /// Route one request through the strategy's fallback chain.
    pub async fn chat(
        &self,
        params: &ChatParams,
        route: &Route,
        strategy: RoutingStrategy,
    ) -> Result<RoutedResponse> {
        self.dispatcher.dispatch(params, route, strategy).await
    }

    /// Operator-facing status of every configured backend.
    pub fn backend_status(&self) -> Vec<BackendStatus> {
        self.dispatcher.backend_status()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
