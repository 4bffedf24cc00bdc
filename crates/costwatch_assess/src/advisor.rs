//! Optional AI advisor for qualitative risk narration.
//!
//! The advisor is a capability with a no-op default, so its absence is a
//! configuration choice rather than a branch scattered through core logic.
//! Its output only ever lands in `RiskAssessment::narrative`; levels and
//! approval flags come from [`crate::risk`] alone.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use costwatch_model::PendingChange;

use crate::error::{AssessError, AssessResult};

/// Hard ceiling on one advisor round-trip, in seconds.
const ADVISOR_TIMEOUT_SECS: u64 = 20;

/// Capability interface for the AI collaborator.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Complete a prompt. `Ok(None)` means the advisor is absent and the
    /// caller should simply omit narrative text.
    async fn complete(&self, prompt: &str) -> AssessResult<Option<String>>;
}

/// Default advisor: always absent, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdvisor;

#[async_trait]
impl Advisor for NoopAdvisor {
    async fn complete(&self, _prompt: &str) -> AssessResult<Option<String>> {
        Ok(None)
    }
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// HTTP-backed advisor speaking the OpenAI or Anthropic chat API.
pub struct LlmAdvisor {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmAdvisor {
    /// Create an advisor with explicit configuration.
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-4o-mini".to_string(),
            LlmProvider::Anthropic => "claude-3-5-haiku-latest".to_string(),
        };
        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(ADVISOR_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create an advisor from environment variables.
    ///
    /// Checks in order: OPENAI_API_KEY, ANTHROPIC_API_KEY. The model can be
    /// overridden with COSTWATCH_LLM_MODEL.
    pub fn from_env() -> AssessResult<Self> {
        let custom_model = std::env::var("COSTWATCH_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }
        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }
        Err(AssessError::AdvisorNotConfigured)
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_openai(&self, prompt: &str) -> AssessResult<String> {
        let url = "https://api.openai.com/v1/chat/completions";
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_completion_tokens: Some(512),
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssessError::AdvisorRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssessError::AdvisorStatus {
                status: status.as_u16(),
                body,
            });
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AssessError::AdvisorRequest(e.to_string()))?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AssessError::AdvisorEmpty)
    }

    async fn complete_anthropic(&self, prompt: &str) -> AssessResult<String> {
        let url = "https://api.anthropic.com/v1/messages";
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 512,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssessError::AdvisorRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssessError::AdvisorStatus {
                status: status.as_u16(),
                body,
            });
        }

        let result: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AssessError::AdvisorRequest(e.to_string()))?;
        result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(AssessError::AdvisorEmpty)
    }
}

#[async_trait]
impl Advisor for LlmAdvisor {
    async fn complete(&self, prompt: &str) -> AssessResult<Option<String>> {
        let call = async {
            match self.provider {
                LlmProvider::OpenAI => self.complete_openai(prompt).await,
                LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
            }
        };
        match tokio::time::timeout(Duration::from_secs(ADVISOR_TIMEOUT_SECS), call).await {
            Ok(result) => result.map(Some),
            Err(_) => Err(AssessError::AdvisorTimeout(ADVISOR_TIMEOUT_SECS)),
        }
    }
}

/// Ask the advisor for a short narrative on a pending change.
///
/// Failures degrade to `None`: the numeric assessment is already final and
/// narrative text is strictly additive.
pub async fn narrate_change(advisor: &dyn Advisor, change: &PendingChange) -> Option<String> {
    let prompt = format!(
        "A declarative configuration change to unit '{}' is pending. \
         Change kind: {}. Current monthly cost ${:.2}, projected ${:.2}, \
         delta ${:.2}. Deterministic risk level: {}. \
         In two sentences, describe the operational cost implications.",
        change.unit_name,
        change.kind,
        change.current_cost,
        change.projected_cost,
        change.cost_delta,
        change.risk.level,
    );
    match advisor.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Advisor narration failed for unit {}: {}", change.unit_id, e);
            None
        }
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}
