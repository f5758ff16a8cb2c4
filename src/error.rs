//! Error taxonomy for the relay.
//!
//! Individual backend failures are absorbed by the dispatcher as long as a
//! later candidate succeeds; only total chain exhaustion surfaces to the
//! caller, carrying every attempted backend with its distinct reason.

use crate::types::Backend;
use std::fmt;
use thiserror::Error;

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Broad classification of a single backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Deadline expired before the backend answered.
    Timeout,
    /// Transport-level failure (connect, TLS, body read).
    Network,
    /// Backend returned a non-success status or an API-level error payload.
    Api,
    /// Backend reported 429 or an explicit quota condition.
    RateLimited,
    /// Response arrived but carried no usable content.
    Malformed,
}

/// A failure from one backend call, classified for the fallback loop.
#[derive(Debug, Clone, Error)]
#[error("{backend}: {message}")]
pub struct BackendError {
    pub backend: Backend,
    pub kind: BackendErrorKind,
    /// HTTP status when the failure carried one.
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn timeout(backend: Backend, timeout_ms: u64) -> Self {
        Self {
            backend,
            kind: BackendErrorKind::Timeout,
            status: None,
            message: format!("request timed out after {timeout_ms}ms"),
        }
    }

    pub fn network(backend: Backend, message: impl Into<String>) -> Self {
        Self {
            backend,
            kind: BackendErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response. 429 becomes `RateLimited`.
    pub fn api(backend: Backend, status: u16, message: impl Into<String>) -> Self {
        let kind = if status == 429 {
            BackendErrorKind::RateLimited
        } else {
            BackendErrorKind::Api
        };
        Self {
            backend,
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(backend: Backend, message: impl Into<String>) -> Self {
        Self {
            backend,
            kind: BackendErrorKind::Malformed,
            status: None,
            message: message.into(),
        }
    }

    /// Whether advancing the chain may plausibly succeed elsewhere because the
    /// failure was transient here: timeouts, transport errors, and 5xx.
    pub fn retryable(&self) -> bool {
        match self.kind {
            BackendErrorKind::Timeout | BackendErrorKind::Network => true,
            BackendErrorKind::Api => matches!(self.status, Some(s) if s >= 500),
            BackendErrorKind::RateLimited | BackendErrorKind::Malformed => false,
        }
    }

    /// Whether this failure means the backend's quota window is exhausted.
    pub fn quota_exceeded(&self) -> bool {
        self.kind == BackendErrorKind::RateLimited
            || self.message.contains("quota")
            || self.message.contains("429")
    }
}

/// Why one candidate in the fallback chain did not produce a result.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// No credentials at startup; the backend was never built.
    NotConfigured,
    /// Health score at or below the availability threshold.
    Unavailable { health: u32 },
    /// Fixed-window request counter at its cap.
    RateLimited,
    /// Local or shared quota ceiling reached.
    QuotaLimited,
    /// The call was made and failed.
    Failed(BackendError),
}

/// One entry in the dispatcher's per-request attempt log.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub backend: Backend,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::NotConfigured => write!(f, "{}: not configured", self.backend),
            AttemptOutcome::Unavailable { health } => {
                write!(f, "{}: unavailable (health {health})", self.backend)
            }
            AttemptOutcome::RateLimited => write!(f, "{}: rate window exhausted", self.backend),
            AttemptOutcome::QuotaLimited => write!(f, "{}: quota ceiling reached", self.backend),
            AttemptOutcome::Failed(err) => write!(f, "{}: {}", self.backend, err.message),
        }
    }
}

/// The full attempt log carried by an exhaustion error.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog(pub Vec<Attempt>);

impl AttemptLog {
    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AttemptLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for attempt in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
            first = false;
        }
        Ok(())
    }
}

/// Top-level error type for the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Startup configuration problems (for example, zero credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Every candidate in the fallback chain was skipped or failed.
    #[error("all backends exhausted [{0}]")]
    Exhausted(AttemptLog),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_not_quota() {
        let err = BackendError::timeout(Backend::Gemini, 5000);
        assert!(err.retryable());
        assert!(!err.quota_exceeded());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(BackendError::api(Backend::Anthropic, 500, "server error").retryable());
        assert!(BackendError::api(Backend::Anthropic, 529, "overloaded").retryable());
        assert!(!BackendError::api(Backend::Anthropic, 400, "bad request").retryable());
    }

    #[test]
    fn status_429_maps_to_quota() {
        let err = BackendError::api(Backend::MiniMax, 429, "too many requests");
        assert_eq!(err.kind, BackendErrorKind::RateLimited);
        assert!(err.quota_exceeded());
        assert!(!err.retryable());
    }

    #[test]
    fn quota_text_without_429_is_still_quota() {
        let err = BackendError::api(Backend::Gemini, 403, "quota exceeded for project");
        assert_eq!(err.kind, BackendErrorKind::Api);
        assert!(err.quota_exceeded());
    }

    #[test]
    fn malformed_is_terminal() {
        let err = BackendError::malformed(Backend::MiniMax, "empty response");
        assert!(!err.retryable());
        assert!(!err.quota_exceeded());
    }

    #[test]
    fn attempt_log_enumerates_distinct_reasons() {
        let log = AttemptLog(vec![
            Attempt {
                backend: Backend::Gemini,
                outcome: AttemptOutcome::NotConfigured,
            },
            Attempt {
                backend: Backend::Anthropic,
                outcome: AttemptOutcome::Unavailable { health: 10 },
            },
            Attempt {
                backend: Backend::MiniMax,
                outcome: AttemptOutcome::Failed(BackendError::timeout(Backend::MiniMax, 100)),
            },
        ]);
        let rendered = log.to_string();
        assert!(rendered.contains("gemini: not configured"));
        assert!(rendered.contains("anthropic: unavailable (health 10)"));
        assert!(rendered.contains("minimax: request timed out"));
    }
}
