//! Anthropic Messages API adapter.

use super::{AdapterConfig, BackendAdapter, Pricing, send_chat_request};
use crate::error::BackendError;
use crate::health::HealthTracker;
use crate::rate_limit::{RateCaps, RateWindow};
use crate::types::{Backend, ChatParams, ChatResult, RateWindowSnapshot, Role};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const MODEL: &str = "claude-3-5-haiku-20241022";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

const CAPS: RateCaps = RateCaps {
    per_minute: 50,
    per_day: 1000,
};

// Claude 3.5 Haiku: $1.00 / 1M input, $5.00 / 1M output
const PRICING: Pricing = Pricing {
    input_per_mtok: 1.00,
    output_per_mtok: 5.00,
};

pub struct AnthropicAdapter {
    config: AdapterConfig,
    client: reqwest::Client,
    health: HealthTracker,
    window: RateWindow,
}

impl AnthropicAdapter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

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
            "{}/v1/messages",
            self.config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
        )
    }

    fn build_request(&self, params: &ChatParams) -> Value {
        let mut messages = Vec::with_capacity(params.history.len() + 1);
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
            "system": params.full_system_prompt(),
            "messages": messages,
            "max_tokens": params.max_output_tokens.unwrap_or(self.config.max_output_tokens),
            "temperature": params.temperature.unwrap_or(self.config.temperature),
        })
    }

    fn parse_response(&self, body: Value) -> Result<ChatResult, BackendError> {
        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| BackendError::malformed(Backend::Anthropic, "missing content array"))?;

        let mut content = String::new();
        for block in blocks {
            if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    content.push_str(text);
                }
            }
        }

        if content.is_empty() {
            return Err(BackendError::malformed(
                Backend::Anthropic,
                "returned empty response",
            ));
        }

        let tokens_used = match (
            body.pointer("/usage/input_tokens").and_then(|v| v.as_u64()),
            body.pointer("/usage/output_tokens").and_then(|v| v.as_u64()),
        ) {
            (Some(input), Some(output)) => Some((input + output) as u32),
            _ => None,
        };

        let finish_reason = body
            .get("stop_reason")
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
impl BackendAdapter for AnthropicAdapter {
    fn id(&self) -> Backend {
        Backend::Anthropic
    }

    async fn chat(&self, params: &ChatParams) -> Result<ChatResult, BackendError> {
        let deadline = params
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.timeout);

        let request = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request(params));

        let outcome = send_chat_request(Backend::Anthropic, request, deadline)
            .await
            .and_then(|body| self.parse_response(body));

        match &outcome {
            Ok(_) => {
                self.window.record();
                self.health.record_success();
            }
            Err(err) => {
                debug!(error = %err, "anthropic call failed");
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
