//! The dispatcher: gates each candidate in the fallback chain on
//! configuration, health, rate windows, and quota, invokes the first
//! available one, and advances on failure. First success wins; each backend
//! gets exactly one attempt per routing call.

use crate::backends::{BackendRegistry, DEFAULT_MAX_OUTPUT_TOKENS};
use crate::error::{Attempt, AttemptLog, AttemptOutcome, RelayError, Result};
use crate::quota::QuotaLedger;
use crate::router::RoutingStrategy;
use crate::types::{BackendStatus, ChatParams, ChatResult, Route, RoutedResponse};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    quota: Arc<QuotaLedger>,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>, quota: Arc<QuotaLedger>) -> Self {
        Self { registry, quota }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn quota(&self) -> &QuotaLedger {
        &self.quota
    }

    /// Route one request through the strategy's fallback chain.
    ///
    /// Candidates are tried strictly in chain order. Skips (unconfigured,
    /// unhealthy, rate- or quota-limited) and hard failures are both logged
    /// per backend; if no candidate produces a result the whole log is
    /// surfaced so operators can tell "all down" from "all quota-exhausted"
    /// from "none configured".
    pub async fn dispatch(
        &self,
        params: &ChatParams,
        route: &Route,
        strategy: RoutingStrategy,
    ) -> Result<RoutedResponse> {
        let start = Instant::now();
        let params = resolve_with_route(params, route);
        let chain = strategy.chain(&self.registry);
        let mut attempts = Vec::new();

        for backend in chain.iter() {
            let Some(adapter) = self.registry.get(backend) else {
                debug!(backend = %backend, "skipping: not configured");
                attempts.push(Attempt {
                    backend,
                    outcome: AttemptOutcome::NotConfigured,
                });
                continue;
            };

            if !adapter.is_available() {
                let health = adapter.health_score();
                warn!(backend = %backend, health, "skipping: unavailable");
                attempts.push(Attempt {
                    backend,
                    outcome: AttemptOutcome::Unavailable { health },
                });
                continue;
            }

            if adapter.rate_limit_info().is_limited {
                warn!(backend = %backend, "skipping: rate window exhausted");
                attempts.push(Attempt {
                    backend,
                    outcome: AttemptOutcome::RateLimited,
                });
                continue;
            }

            if !self.quota.check_limit(backend).await {
                warn!(backend = %backend, "skipping: quota ceiling reached");
                attempts.push(Attempt {
                    backend,
                    outcome: AttemptOutcome::QuotaLimited,
                });
                continue;
            }

            debug!(backend = %backend, tier = %route.model_tier, "dispatching");
            match adapter.chat(&params).await {
                Ok(result) => {
                    let tokens = resolved_tokens(&params, &result);
                    let cost = adapter.estimate_cost(&params);
                    self.quota.record_usage(backend, tokens, cost);

                    let latency_ms = start.elapsed().as_millis() as u64;
                    info!(backend = %backend, latency_ms, "request served");
                    return Ok(RoutedResponse {
                        result,
                        backend,
                        latency_ms,
                    });
                }
                Err(err) => {
                    warn!(
                        backend = %backend,
                        error = %err,
                        retryable = err.retryable(),
                        quota = err.quota_exceeded(),
                        "attempt failed, advancing chain"
                    );
                    attempts.push(Attempt {
                        backend,
                        outcome: AttemptOutcome::Failed(err),
                    });
                }
            }
        }

        Err(RelayError::Exhausted(AttemptLog(attempts)))
    }

    /// Operator-facing snapshot of every configured backend.
    pub fn backend_status(&self) -> Vec<BackendStatus> {
        self.registry
            .iter()
            .map(|(backend, adapter)| BackendStatus {
                backend,
                available: adapter.is_available(),
                health: adapter.health_score(),
                rate: adapter.rate_limit_info(),
            })
            .collect()
    }
}

/// Fill request defaults from the route: deadline and, when the request
/// carries no system prompt, the route's template.
fn resolve_with_route(params: &ChatParams, route: &Route) -> ChatParams {
    let mut resolved = params.clone();
    if resolved.timeout_ms.is_none() {
        resolved.timeout_ms = Some(route.timeout_ms);
    }
    if resolved.system_prompt.is_empty() {
        resolved.system_prompt = route.system_prompt_template.clone();
    }
    resolved
}

/// Tokens to charge against quota: the backend's reported usage when
/// present, otherwise the chars/4 input heuristic plus the output budget.
fn resolved_tokens(params: &ChatParams, result: &ChatResult) -> u64 {
    match result.tokens_used {
        Some(tokens) => u64::from(tokens),
        None => {
            let input = (params.query.len() + params.system_prompt.len()) / 4;
            input as u64 + u64::from(params.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS))
        }
    }
}
