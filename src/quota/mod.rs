//! Per-backend token/cost accounting.
//!
//! Two tiers: a local append-only ledger pruned to a rolling 24 h window,
//! and an optional best-effort shared store for approximate cross-instance
//! visibility. The local tier is authoritative for gating when the shared
//! tier is absent or unreadable.

mod ledger;
#[cfg(feature = "redis")]
mod shared;

pub use ledger::{QuotaLedger, QuotaLimits, QuotaStats, UsageRecord, UsageWindow};
#[cfg(feature = "redis")]
pub use shared::SharedQuotaStore;
