//! Language-model intent extraction.
//!
//! Sends the prompt to an OpenAI-compatible chat completions endpoint (Groq
//! by default) in JSON mode, with the intent schema embedded in the user
//! message. The raw JSON object is returned untouched; coercion into an
//! [`Intent`](wayfarer_core::types::Intent) is the normalizer's job.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use wayfarer_core::config::LlmConfig;

use crate::error::ChatError;

const SYSTEM_PROMPT: &str = "Extract travel intent into STRICT JSON that conforms exactly to the provided JSON Schema. Do not include any prose.";

/// First-pass extractor: prompt in, JSON object out.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, prompt: &str) -> Result<Value, ChatError>;
}

/// JSON Schema of the intent object requested from the model.
pub fn intent_schema() -> Value {
    let nullable = |kind: &str| json!({ "type": [kind, "null"] });
    json!({
        "type": "object",
        "properties": {
            "destination": nullable("string"),
            "country": nullable("string"),
            "continent": nullable("string"),
            "budgetMin": nullable("number"),
            "budgetMax": nullable("number"),
            "durationDays": nullable("number"),
            "month": nullable("number"),
            "year": nullable("number"),
            "transportType": nullable("string"),
            "accommodationLevel": nullable("string"),
            "peopleCount": nullable("number"),
            "mustInclude": { "type": "array", "items": { "type": "string" } },
            "niceToHave": { "type": "array", "items": { "type": "string" } },
            "notes": nullable("string"),
        },
        "required": [
            "destination", "country", "continent", "budgetMin", "budgetMax",
            "durationDays", "month", "year", "transportType", "accommodationLevel",
            "peopleCount", "mustInclude", "niceToHave", "notes"
        ],
        "additionalProperties": false,
    })
}

fn user_message(prompt: &str, schema: &Value) -> String {
    format!(
        "User prompt: {}\n\nReturn JSON matching this schema: {}",
        prompt, schema
    )
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// [`IntentExtractor`] backed by a chat completions API.
#[derive(Clone)]
pub struct LlmIntentExtractor {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl LlmIntentExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: defaults.model,
            base_url: defaults.base_url,
            temperature: defaults.temperature,
        }
    }

    /// Build from config. Returns `None` when extraction is disabled or no
    /// API key is available.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let api_key = config.api_key()?;
        Some(
            Self::new(api_key)
                .with_model(config.model.clone())
                .with_base_url(config.base_url.clone())
                .with_temperature(config.temperature),
        )
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(&self, prompt: &str) -> Result<Value, ChatError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message(prompt, &intent_schema()),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Llm(format!("status {}: {}", status, body)));
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Extraction("empty completion".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "LLM extraction response");
        parse_json_object(&content)
    }
}

/// Parse a model reply as a JSON object, tolerating a surrounding Markdown
/// code fence.
pub fn parse_json_object(content: &str) -> Result<Value, ChatError> {
    let trimmed = strip_code_fence(content.trim());
    let value: Value = serde_json::from_str(trimmed)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ChatError::Extraction(
            "model reply is not a JSON object".to_string(),
        ))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
