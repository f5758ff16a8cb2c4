//! Shared contracts: backend identity, chat request/result types, and the
//! opaque routing descriptor consumed from the upstream classifier.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identity of a configured text-generation backend.
///
/// The set is fixed at compile time; which members are actually usable is
/// decided once at startup from which credentials are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gemini,
    Anthropic,
    MiniMax,
}

impl Backend {
    /// All known backends, in declaration order.
    pub const ALL: [Backend; 3] = [Backend::Gemini, Backend::Anthropic, Backend::MiniMax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Anthropic => "anthropic",
            Backend::MiniMax => "minimax",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of prior conversation, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A single chat-completion request. Immutable once built; one per call.
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    /// The new user turn.
    pub query: String,
    /// System prompt for this request.
    pub system_prompt: String,
    /// Prior conversation, oldest first.
    pub history: Vec<ConversationMessage>,
    /// Retrieved reference material, appended to the system prompt when present.
    pub retrieved_context: Option<String>,
    /// Hard deadline for the backend call. Falls back to the route's timeout,
    /// then the adapter default.
    pub timeout_ms: Option<u64>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// System prompt with retrieved context appended, when any.
    pub fn full_system_prompt(&self) -> Cow<'_, str> {
        match &self.retrieved_context {
            Some(ctx) if !ctx.is_empty() => Cow::Owned(format!(
                "{}\n\nReference material:\n{}",
                self.system_prompt, ctx
            )),
            _ => Cow::Borrowed(&self.system_prompt),
        }
    }
}

/// Result of one successful backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    /// Resolved model name as reported by (or configured for) the backend.
    pub model_name: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

/// A `ChatResult` plus the identity of the backend that served it.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub result: ChatResult,
    pub backend: Backend,
    pub latency_ms: u64,
}

/// Opaque routing descriptor produced by the upstream intent classifier.
/// Consumed here for its timeout and system-prompt defaults, never produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub model_tier: String,
    pub timeout_ms: u64,
    pub system_prompt_template: String,
}

/// Point-in-time view of one backend's fixed-window request counters.
#[derive(Debug, Clone, Serialize)]
pub struct RateWindowSnapshot {
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
    pub current_minute_usage: u32,
    pub current_day_usage: u32,
    pub is_limited: bool,
}

/// Operator-facing status of one configured backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub backend: Backend,
    pub available: bool,
    pub health: u32,
    pub rate: RateWindowSnapshot,
}
