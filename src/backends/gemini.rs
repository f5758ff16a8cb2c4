//! Google Gemini adapter.

use super::{AdapterConfig, BackendAdapter, Pricing, send_chat_request};
use crate::error::BackendError;
use crate::health::HealthTracker;
use crate::rate_limit::{RateCaps, RateWindow};
use crate::types::{Backend, ChatParams, ChatResult, RateWindowSnapshot, Role};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const MODEL: &str = "gemini-2.0-flash-lite";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const CAPS: RateCaps = RateCaps {
    per_minute: 60,
    per_day: 1500,
};

// Gemini 2.0 Flash Lite: $0.075 / 1M input, $0.30 / 1M output
const PRICING: Pricing = Pricing {
    input_per_mtok: 0.075,
    output_per_mtok: 0.30,
};

pub struct GeminiAdapter {
    config: AdapterConfig,
    client: reqwest::Client,
    health: HealthTracker,
    window: RateWindow,
}

impl GeminiAdapter {
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
            "{}/v1beta/models/{}:generateContent",
            self.config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/'),
            MODEL
        )
    }

    fn build_request(&self, params: &ChatParams) -> Value {
        let mut contents = Vec::with_capacity(params.history.len() + 1);
        for msg in &params.history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(json!({ "role": role, "parts": [{ "text": msg.text }] }));
        }
        contents.push(json!({ "role": "user", "parts": [{ "text": params.query }] }));

        json!({
            "system_instruction": { "parts": [{ "text": params.full_system_prompt() }] },
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": params.max_output_tokens.unwrap_or(self.config.max_output_tokens),
                "temperature": params.temperature.unwrap_or(self.config.temperature),
            },
        })
    }

    fn parse_response(&self, body: Value) -> Result<ChatResult, BackendError> {
        let candidate = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| BackendError::malformed(Backend::Gemini, "no candidates in response"))?;

        let mut content = String::new();
        if let Some(parts) = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    content.push_str(text);
                }
            }
        }

        if content.is_empty() {
            return Err(BackendError::malformed(
                Backend::Gemini,
                "returned empty response",
            ));
        }

        let tokens_used = body
            .pointer("/usageMetadata/totalTokenCount")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        let finish_reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .map(|r| r.to_ascii_lowercase());

        Ok(ChatResult {
            content,
            model_name: MODEL.to_string(),
            tokens_used,
            finish_reason,
        })
    }
}

#[async_trait]
impl BackendAdapter for GeminiAdapter {
    fn id(&self) -> Backend {
        Backend::Gemini
    }

    async fn chat(&self, params: &ChatParams) -> Result<ChatResult, BackendError> {
        let deadline = params
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.timeout);

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_request(params));

        let outcome = send_chat_request(Backend::Gemini, request, deadline)
            .await
            .and_then(|body| self.parse_response(body));

        match &outcome {
            Ok(_) => {
                self.window.record();
                self.health.record_success();
            }
            Err(err) => {
                debug!(error = %err, "gemini call failed");
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
