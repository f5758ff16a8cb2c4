//! MiniMax chat-completions adapter.
//!
//! MiniMax reports API-level failures inside a 200 response via `base_resp`,
//! and interleaves reasoning markup in the generated text; both are handled
//! here so callers only ever see clean content or a classified error.

use super::{AdapterConfig, BackendAdapter, Pricing, send_chat_request};
use crate::error::BackendError;
use crate::health::HealthTracker;
use crate::rate_limit::{RateCaps, RateWindow};
use crate::types::{Backend, ChatParams, ChatResult, RateWindowSnapshot, Role};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const MODEL: &str = "MiniMax-M2.5";
const DEFAULT_BASE_URL: &str = "https://api.minimax.chat";

const CAPS: RateCaps = RateCaps {
    per_minute: 30,
    per_day: 500,
};

const PRICING: Pricing = Pricing {
    input_per_mtok: 0.10,
    output_per_mtok: 0.40,
};

static THINK_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Remove backend-internal reasoning markup before the text is surfaced.
fn strip_control_markup(text: &str) -> String {
    THINK_MARKUP.replace_all(text, "").trim().to_string()
}

pub struct MiniMaxAdapter {
    config: AdapterConfig,
    client: reqwest::Client,
    health: HealthTracker,
    window: RateWindow,
}

impl MiniMaxAdapter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(config: AdapterConfig) -> Result<Self, crate::error::RelayError> {
        let client = super::build_http_client()?;
        Ok(Self {
            config,
            client,
            health: HealthTracker::new(),
            window: RateWindow::new(CAPS),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
        )
    }

    fn build_request(&self, params: &ChatParams) -> Value {
        let mut messages = Vec::with_capacity(params.history.len() + 2);
        messages.push(json!({ "role": "system", "content": params.full_system_prompt() }));
        for msg in &params.history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": msg.text }));
        }
        messages.push(json!({ "role": "user", "content": params.query }));

        json!({
            "model": MODEL,
            "messages": messages,
            "max_tokens": params.max_output_tokens.unwrap_or(self.config.max_output_tokens),
            "temperature": params.temperature.unwrap_or(self.config.temperature),
        })
    }

    fn parse_response(&self, body: Value) -> Result<ChatResult, BackendError> {
        // API-level failure embedded in a 200 response.
        if let Some(code) = body.pointer("/base_resp/status_code").and_then(|v| v.as_i64()) {
            if code != 0 {
                let msg = body
                    .pointer("/base_resp/status_msg")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                return Err(BackendError::malformed(
                    Backend::MiniMax,
                    format!("API error {code}: {msg}"),
                ));
            }
        }

        let raw = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let content = strip_control_markup(raw);

        if content.is_empty() {
            return Err(BackendError::malformed(
                Backend::MiniMax,
                "returned empty response",
            ));
        }

        let tokens_used = body
            .pointer("/usage/total_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        let finish_reason = body
            .pointer("/choices/0/finish_reason")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string());

        Ok(ChatResult {
            content,
            model_name: MODEL.to_string(),
            tokens_used,
            finish_reason,
        })
    }
}

#[async_trait]
impl BackendAdapter for MiniMaxAdapter {
    fn id(&self) -> Backend {
        Backend::MiniMax
    }

    async fn chat(&self, params: &ChatParams) -> Result<ChatResult, BackendError> {
        let deadline = params
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.timeout);

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(params));

        let outcome = send_chat_request(Backend::MiniMax, request, deadline)
            .await
            .and_then(|body| self.parse_response(body));

        match &outcome {
            Ok(_) => {
                self.window.record();
                self.health.record_success();
            }
            Err(err) => {
                debug!(error = %err, "minimax call failed");
                self.health.record_failure();
            }
        }
        outcome
    }

    fn is_available(&self) -> bool {
        !self.config.api_key.is_empty() && self.health.is_healthy()
    }

    fn rate_limit_info(&self) -> RateWindowSnapshot {
        self.window.snapshot()
    }

    fn estimate_cost(&self, params: &ChatParams) -> f64 {
        PRICING.estimate(params, self.config.max_output_tokens)
    }

    fn health_score(&self) -> u32 {
        self.health.score()
    }
}
