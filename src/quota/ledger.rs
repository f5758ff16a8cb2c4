//! Local quota tier: per-backend usage events with minute/day aggregates.

use crate::types::Backend;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[cfg(feature = "redis")]
use super::shared::SharedQuotaStore;

/// Soft ceilings for one backend per time window.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
    pub cost_per_day_usd: f64,
}

impl QuotaLimits {
    /// Static limits per backend, from each provider's published tiers.
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Gemini => Self {
                requests_per_minute: 60,
                requests_per_day: 1500,
                cost_per_day_usd: 5.0,
            },
            Backend::Anthropic => Self {
                requests_per_minute: 50,
                requests_per_day: 1000,
                cost_per_day_usd: 10.0,
            },
            Backend::MiniMax => Self {
                requests_per_minute: 30,
                requests_per_day: 500,
                cost_per_day_usd: 3.0,
            },
        }
    }
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub tokens: u64,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate usage over one time window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageWindow {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Point-in-time quota view for one backend.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStats {
    pub backend: Backend,
    pub current_minute: UsageWindow,
    pub current_day: UsageWindow,
    pub is_limited: bool,
}

/// Append-only per-backend usage ledger, pruned to 24 h on write.
///
/// Gating reads are deliberately not linearizable with the writes that
/// follow them: two concurrent calls may both pass `check_limit` and both
/// record afterwards. The limiter is advisory, so that slack is what lets
/// it avoid a global lock around the whole request.
pub struct QuotaLedger {
    usage: Mutex<HashMap<Backend, Vec<UsageRecord>>>,
    limits: HashMap<Backend, QuotaLimits>,
    #[cfg(feature = "redis")]
    shared: Option<SharedQuotaStore>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self {
            usage: Mutex::new(HashMap::new()),
            limits: Backend::ALL
                .iter()
                .map(|&b| (b, QuotaLimits::for_backend(b)))
                .collect(),
            #[cfg(feature = "redis")]
            shared: None,
        }
    }

    /// Override the limits for one backend.
    pub fn set_limits(&mut self, backend: Backend, limits: QuotaLimits) {
        self.limits.insert(backend, limits);
    }

    /// Attach the best-effort shared tier.
    #[cfg(feature = "redis")]
    pub fn with_shared(mut self, shared: SharedQuotaStore) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn limits(&self, backend: Backend) -> QuotaLimits {
        self.limits
            .get(&backend)
            .copied()
            .unwrap_or_else(|| QuotaLimits::for_backend(backend))
    }

    /// Record one served call. Prunes entries older than 24 h and issues the
    /// detached shared-tier write when a shared store is attached.
    pub fn record_usage(&self, backend: Backend, tokens: u64, cost: f64) {
        self.record_usage_at(backend, tokens, cost, Utc::now());

        #[cfg(feature = "redis")]
        if let Some(shared) = &self.shared {
            shared.record_detached(backend, cost);
        }
    }

    /// Whether `backend` may serve another request right now. Prefers the
    /// shared tier; any read failure there fails open since the shared view
    /// is advisory. Falls back to the local ledger otherwise.
    pub async fn check_limit(&self, backend: Backend) -> bool {
        #[cfg(feature = "redis")]
        if let Some(shared) = &self.shared {
            if !shared.is_noop() {
                return match shared.is_limited(backend, &self.limits(backend)).await {
                    Ok(limited) => !limited,
                    Err(err) => {
                        debug!(backend = %backend, error = %err,
                            "shared quota read failed, failing open");
                        true
                    }
                };
            }
        }
        !self.stats(backend).is_limited
    }

    pub fn stats(&self, backend: Backend) -> QuotaStats {
        self.stats_at(backend, Utc::now())
    }

    pub fn all_stats(&self) -> Vec<QuotaStats> {
        Backend::ALL.iter().map(|&b| self.stats(b)).collect()
    }

    /// Estimated spend across all backends over the trailing `hours`.
    pub fn total_cost(&self, hours: i64) -> f64 {
        let cutoff = Utc::now() - Duration::hours(hours);
        let usage = self.usage.lock();
        usage
            .values()
            .flatten()
            .filter(|r| r.timestamp > cutoff)
            .map(|r| r.cost)
            .sum()
    }

    fn record_usage_at(&self, backend: Backend, tokens: u64, cost: f64, now: DateTime<Utc>) {
        debug_assert!(cost >= 0.0, "negative cost recorded");
        let mut usage = self.usage.lock();
        let records = usage.entry(backend).or_default();
        records.push(UsageRecord {
            tokens,
            cost: cost.max(0.0),
            timestamp: now,
        });
        let cutoff = now - Duration::hours(24);
        records.retain(|r| r.timestamp > cutoff);
    }

    fn stats_at(&self, backend: Backend, now: DateTime<Utc>) -> QuotaStats {
        let minute_cutoff = now - Duration::minutes(1);
        let day_cutoff = now - Duration::hours(24);
        let limits = self.limits(backend);

        let usage = self.usage.lock();
        let records: &[UsageRecord] = usage.get(&backend).map(Vec::as_slice).unwrap_or(&[]);

        let mut current_minute = UsageWindow::default();
        let mut current_day = UsageWindow::default();
        for record in records {
            if record.timestamp > day_cutoff {
                current_day.requests += 1;
                current_day.tokens += record.tokens;
                current_day.cost += record.cost;
                if record.timestamp > minute_cutoff {
                    current_minute.requests += 1;
                    current_minute.tokens += record.tokens;
                    current_minute.cost += record.cost;
                }
            }
        }

        let is_limited = current_minute.requests >= u64::from(limits.requests_per_minute)
            || current_day.requests >= u64::from(limits.requests_per_day)
            || current_day.cost >= limits.cost_per_day_usd;

        QuotaStats {
            backend,
            current_minute,
            current_day,
            is_limited,
        }
    }
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new()
    }
}
