//! Dispatcher behavior against scripted adapters: chain ordering,
//! first-success-wins, gating skips, and exhaustion reporting.

use async_trait::async_trait;
use llm_relay::{
    AttemptOutcome, Backend, BackendAdapter, BackendError, BackendRegistry, ChatParams,
    ChatResult, Dispatcher, QuotaLedger, QuotaLimits, RateWindowSnapshot, Relay, RelayError,
    Route, RoutingStrategy,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct StubAdapter {
    id: Backend,
    health: u32,
    rate_limited: bool,
    response: Result<String, BackendError>,
    calls: AtomicU32,
}

impl StubAdapter {
    fn ok(id: Backend, text: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            health: 100,
            rate_limited: false,
            response: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn failing(id: Backend, error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            id,
            health: 100,
            rate_limited: false,
            response: Err(error),
            calls: AtomicU32::new(0),
        })
    }

    fn with_health(id: Backend, health: u32, text: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            health,
            rate_limited: false,
            response: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn rate_limited(id: Backend) -> Arc<Self> {
        Arc::new(Self {
            id,
            health: 100,
            rate_limited: true,
            response: Ok("unreachable".to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for StubAdapter {
    fn id(&self) -> Backend {
        self.id
    }

    async fn chat(&self, _params: &ChatParams) -> Result<ChatResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(text) => Ok(ChatResult {
                content: text.clone(),
                model_name: "stub-model".to_string(),
                tokens_used: Some(42),
                finish_reason: Some("stop".to_string()),
            }),
            Err(err) => Err(err.clone()),
        }
    }

    fn is_available(&self) -> bool {
        self.health > 20
    }

    fn rate_limit_info(&self) -> RateWindowSnapshot {
        RateWindowSnapshot {
            requests_per_minute: 60,
            requests_per_day: 1000,
            current_minute_usage: if self.rate_limited { 60 } else { 0 },
            current_day_usage: 0,
            is_limited: self.rate_limited,
        }
    }

    fn estimate_cost(&self, _params: &ChatParams) -> f64 {
        0.001
    }

    fn health_score(&self) -> u32 {
        self.health
    }
}

fn registry_of(adapters: &[Arc<StubAdapter>]) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    for adapter in adapters {
        registry.insert(adapter.clone());
    }
    registry
}

fn dispatcher_of(adapters: &[Arc<StubAdapter>]) -> Dispatcher {
    Dispatcher::new(
        Arc::new(registry_of(adapters)),
        Arc::new(QuotaLedger::new()),
    )
}

fn route() -> Route {
    Route {
        model_tier: "flash".to_string(),
        timeout_ms: 5_000,
        system_prompt_template: "You are a test assistant.".to_string(),
    }
}

#[tokio::test]
async fn first_success_wins_and_later_candidates_are_never_called() {
    let gemini = StubAdapter::ok(Backend::Gemini, "from gemini");
    let anthropic = StubAdapter::ok(Backend::Anthropic, "from anthropic");
    let minimax = StubAdapter::ok(Backend::MiniMax, "from minimax");
    let dispatcher = dispatcher_of(&[gemini.clone(), anthropic.clone(), minimax.clone()]);

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::Gemini);
    assert_eq!(response.result.content, "from gemini");
    assert_eq!(gemini.call_count(), 1);
    assert_eq!(anthropic.call_count(), 0);
    assert_eq!(minimax.call_count(), 0);
}

#[tokio::test]
async fn unhealthy_primary_is_skipped_without_a_call() {
    let gemini = StubAdapter::with_health(Backend::Gemini, 10, "never served");
    let anthropic = StubAdapter::ok(Backend::Anthropic, "from anthropic");
    let dispatcher = dispatcher_of(&[gemini.clone(), anthropic.clone()]);

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::Anthropic);
    assert_eq!(gemini.call_count(), 0);
    assert_eq!(anthropic.call_count(), 1);
}

#[tokio::test]
async fn failures_and_limits_advance_the_chain() {
    // Gemini times out, Anthropic is at its rate window, MiniMax serves.
    let gemini = StubAdapter::failing(Backend::Gemini, BackendError::timeout(Backend::Gemini, 100));
    let anthropic = StubAdapter::rate_limited(Backend::Anthropic);
    let minimax = StubAdapter::ok(Backend::MiniMax, "from minimax");
    let dispatcher = dispatcher_of(&[gemini.clone(), anthropic.clone(), minimax.clone()]);

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::MiniMax);
    assert_eq!(gemini.call_count(), 1, "failed backend gets exactly one attempt");
    assert_eq!(anthropic.call_count(), 0, "rate-limited backend is never called");
    assert_eq!(minimax.call_count(), 1);

    // The winning call is charged against quota.
    let stats = dispatcher.quota().stats(Backend::MiniMax);
    assert_eq!(stats.current_day.requests, 1);
    assert_eq!(stats.current_day.tokens, 42);
}

#[tokio::test]
async fn exhaustion_enumerates_every_attempt_with_its_reason() {
    let gemini = StubAdapter::failing(Backend::Gemini, BackendError::timeout(Backend::Gemini, 100));
    let anthropic = StubAdapter::failing(
        Backend::Anthropic,
        BackendError::api(Backend::Anthropic, 429, "too many requests"),
    );
    // MiniMax is deliberately absent from the registry.
    let dispatcher = dispatcher_of(&[gemini.clone(), anthropic.clone()]);

    let err = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap_err();

    let RelayError::Exhausted(log) = err else {
        panic!("expected exhaustion, got {err}");
    };
    assert_eq!(log.len(), 3);

    let attempts: Vec<_> = log.iter().collect();
    assert_eq!(attempts[0].backend, Backend::Gemini);
    assert!(matches!(
        &attempts[0].outcome,
        AttemptOutcome::Failed(e) if e.retryable()
    ));
    assert_eq!(attempts[1].backend, Backend::Anthropic);
    assert!(matches!(
        &attempts[1].outcome,
        AttemptOutcome::Failed(e) if e.quota_exceeded()
    ));
    assert_eq!(attempts[2].backend, Backend::MiniMax);
    assert!(matches!(attempts[2].outcome, AttemptOutcome::NotConfigured));

    // Each configured backend got exactly one attempt.
    assert_eq!(gemini.call_count(), 1);
    assert_eq!(anthropic.call_count(), 1);
}

#[tokio::test]
async fn day_cost_cap_skips_backend_regardless_of_health() {
    let gemini = StubAdapter::ok(Backend::Gemini, "never served");
    let anthropic = StubAdapter::ok(Backend::Anthropic, "from anthropic");

    let mut ledger = QuotaLedger::new();
    ledger.set_limits(
        Backend::Gemini,
        QuotaLimits {
            requests_per_minute: 100,
            requests_per_day: 100,
            cost_per_day_usd: 5.0,
        },
    );
    // Spend the whole day budget up front.
    ledger.record_usage(Backend::Gemini, 1_000, 5.0);

    let dispatcher = Dispatcher::new(
        Arc::new(registry_of(&[gemini.clone(), anthropic.clone()])),
        Arc::new(ledger),
    );

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::Anthropic);
    assert_eq!(gemini.call_count(), 0, "capped backend must not be invoked");
}

#[tokio::test]
async fn quota_limited_backend_is_reported_distinctly_on_exhaustion() {
    let gemini = StubAdapter::ok(Backend::Gemini, "never served");

    let mut ledger = QuotaLedger::new();
    ledger.set_limits(
        Backend::Gemini,
        QuotaLimits {
            requests_per_minute: 100,
            requests_per_day: 100,
            cost_per_day_usd: 1.0,
        },
    );
    ledger.record_usage(Backend::Gemini, 100, 1.0);

    let dispatcher = Dispatcher::new(
        Arc::new(registry_of(&[gemini.clone()])),
        Arc::new(ledger),
    );

    let err = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Web)
        .await
        .unwrap_err();

    let RelayError::Exhausted(log) = err else {
        panic!("expected exhaustion");
    };
    let quota_limited = log
        .iter()
        .find(|a| a.backend == Backend::Gemini)
        .unwrap();
    assert!(matches!(quota_limited.outcome, AttemptOutcome::QuotaLimited));
    assert_eq!(gemini.call_count(), 0);
}

#[tokio::test]
async fn adaptive_strategy_prefers_the_healthiest_backend() {
    let gemini = StubAdapter::with_health(Backend::Gemini, 50, "from gemini");
    let anthropic = StubAdapter::with_health(Backend::Anthropic, 90, "from anthropic");
    let minimax = StubAdapter::with_health(Backend::MiniMax, 70, "from minimax");
    let dispatcher = dispatcher_of(&[gemini.clone(), anthropic.clone(), minimax.clone()]);

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Adaptive)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::Anthropic);
    assert_eq!(gemini.call_count(), 0);
    assert_eq!(minimax.call_count(), 0);
}

#[tokio::test]
async fn bot_strategy_reorders_the_chain() {
    let gemini = StubAdapter::ok(Backend::Gemini, "from gemini");
    let minimax = StubAdapter::ok(Backend::MiniMax, "from minimax");
    let dispatcher = dispatcher_of(&[gemini.clone(), minimax.clone()]);

    let response = dispatcher
        .dispatch(&ChatParams::new("hello"), &route(), RoutingStrategy::Bot)
        .await
        .unwrap();

    assert_eq!(response.backend, Backend::MiniMax);
    assert_eq!(gemini.call_count(), 0);
}

#[tokio::test]
async fn relay_facade_exposes_backend_status() {
    let gemini = StubAdapter::with_health(Backend::Gemini, 10, "x");
    let anthropic = StubAdapter::ok(Backend::Anthropic, "y");
    let relay = Relay::new(
        registry_of(&[gemini.clone(), anthropic.clone()]),
        QuotaLedger::new(),
    );

    let status = relay.backend_status();
    assert_eq!(status.len(), 2);

    let gemini_status = status.iter().find(|s| s.backend == Backend::Gemini).unwrap();
    assert!(!gemini_status.available);
    assert_eq!(gemini_status.health, 10);

    let anthropic_status = status
        .iter()
        .find(|s| s.backend == Backend::Anthropic)
        .unwrap();
    assert!(anthropic_status.available);
}
