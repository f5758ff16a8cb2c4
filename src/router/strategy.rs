//! Routing strategies: named policies mapping traffic origin to an ordered
//! fallback chain.

use crate::backends::BackendRegistry;
use crate::types::Backend;
use serde::{Deserialize, Serialize};

/// Named routing policy, chosen per traffic origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Direct API traffic: Gemini first, cheapest adequate model.
    Web,
    /// Bot-originated traffic: MiniMax first.
    Bot,
    /// All configured backends by current health score, best first.
    /// Stateless; recomputed per call with no hysteresis.
    Adaptive,
}

/// Ordered candidates for one routing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackChain {
    pub primary: Backend,
    pub secondary: Option<Backend>,
    pub tertiary: Option<Backend>,
}

impl FallbackChain {
    pub fn iter(&self) -> impl Iterator<Item = Backend> {
        [Some(self.primary), self.secondary, self.tertiary]
            .into_iter()
            .flatten()
    }
}

impl RoutingStrategy {
    /// Resolve this strategy to an ordered chain. Static strategies ignore
    /// the registry; `Adaptive` sorts the configured backends by health.
    pub fn chain(&self, registry: &BackendRegistry) -> FallbackChain {
        match self {
            RoutingStrategy::Web => FallbackChain {
                primary: Backend::Gemini,
                secondary: Some(Backend::Anthropic),
                tertiary: Some(Backend::MiniMax),
            },
            RoutingStrategy::Bot => FallbackChain {
                primary: Backend::MiniMax,
                secondary: Some(Backend::Gemini),
                tertiary: Some(Backend::Anthropic),
            },
            RoutingStrategy::Adaptive => {
                let mut scored: Vec<(Backend, u32)> = registry
                    .iter()
                    .map(|(backend, adapter)| (backend, adapter.health_score()))
                    .collect();
                // Declaration order breaks score ties deterministically.
                scored.sort_by(|a, b| b.1.cmp(&a.1));

                FallbackChain {
                    primary: scored.first().map(|(b, _)| *b).unwrap_or(Backend::Gemini),
                    secondary: scored.get(1).map(|(b, _)| *b),
                    tertiary: scored.get(2).map(|(b, _)| *b),
                }
            }
        }
    }
}
