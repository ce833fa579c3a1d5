//! Async client for the Gemini `generateContent` endpoint.
//!
//! All generation parameters (model, temperature, output length, safety
//! thresholds, timeout) are fixed when the [`GeminiClient`] is built; a call
//! only carries the prompt text.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use super::error::{GenerationError, classify_failure, from_status};
use crate::{DEFAULT_MODEL, GEMINI_API_BASE, GenerateFuture, TextGenerator};

/// Returned when the service refused the prompt itself.
pub const PROMPT_BLOCKED_REPLY: &str = "Sorry, your request was blocked due to safety concerns.";

/// Returned when a candidate answer was withheld by a safety rating.
pub const RESPONSE_BLOCKED_REPLY: &str =
    "Sorry, the model's response was blocked due to safety concerns.";

/// Returned when the service answered without any text and without saying why.
pub const NO_RESPONSE_REPLY: &str = "I didn't receive a valid response from the AI model.";

// ── Configuration ──────────────────────────────────────────────────

/// Harm categories the client sets thresholds for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
}

/// Blocking threshold for a [`HarmCategory`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// One entry of the request's `safetySettings` list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Harassment and hate-speech settings, both at `threshold`.
pub fn safety_settings(threshold: HarmBlockThreshold) -> Vec<SafetySetting> {
    [HarmCategory::Harassment, HarmCategory::HateSpeech]
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold,
        })
        .collect()
}

/// Fixed generation parameters for a [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model identifier, with or without the `models/` prefix.
    pub model: String,
    /// Sampling temperature. Default: `0.0`.
    pub temperature: f32,
    /// Maximum output tokens. Default: `10000`.
    pub max_output_tokens: u32,
    /// Safety thresholds. Default: harassment and hate speech at `BLOCK_ONLY_HIGH`.
    pub safety_settings: Vec<SafetySetting>,
    /// Whole-request timeout. Default: 60 seconds.
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_output_tokens: 10_000,
            safety_settings: safety_settings(HarmBlockThreshold::BlockOnlyHigh),
            timeout: Duration::from_secs(60),
        }
    }
}

// ── Request types ──────────────────────────────────────────────────

/// Body of a `generateContent` call.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationParams,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

/// Sampling parameters. Temperature is always sent; `0.0` is meaningful here.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// A turn of content, used both in requests and in candidates.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Content {
    /// A single-part user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Parsed `generateContent` response.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    #[serde(default)]
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

/// Metadata returned by `GET models/{model}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub input_token_limit: Option<u32>,
    #[serde(default)]
    pub output_token_limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or `None` when it has no non-blank text.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// The answer to hand back to the user.
    ///
    /// Never fails: a missing answer is explained with one of the fixed
    /// fallback sentences, chosen by why the service withheld it.
    pub fn answer_text(&self) -> String {
        if let Some(text) = self.text() {
            return text;
        }

        warn!("Empty response. Checking details...");
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            error!("Prompt blocked due to: {reason}");
            return PROMPT_BLOCKED_REPLY.to_string();
        }

        for candidate in &self.candidates {
            if let Some(reason) = candidate.finish_reason.as_deref() {
                warn!("Candidate finish reason: {reason}");
            }
            if let Some(rating) = candidate.safety_ratings.iter().find(|r| r.blocked) {
                error!(
                    category = %rating.category,
                    probability = %rating.probability,
                    "Candidate blocked by safety rating"
                );
                return RESPONSE_BLOCKED_REPLY.to_string();
            }
            if candidate.finish_reason.as_deref() == Some("SAFETY") {
                return RESPONSE_BLOCKED_REPLY.to_string();
            }
        }

        warn!(
            candidates = self.candidates.len(),
            "No text response and no clear block/finish reason"
        );
        NO_RESPONSE_REPLY.to_string()
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: GenerationConfig,
}

impl GeminiClient {
    /// Create a client for the public endpoint.
    pub fn new(api_key: impl Into<String>, config: GenerationConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("toolchat/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            config,
        })
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// `models/{model}`, tolerating a model id that already has the prefix.
    fn model_path(&self) -> String {
        let model = &self.config.model;
        if model.starts_with("models/") {
            model.clone()
        } else {
            format!("models/{model}")
        }
    }

    /// Build the request body for `prompt` with this client's fixed parameters.
    pub fn request_for(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationParams {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
            safety_settings: self.config.safety_settings.clone(),
        }
    }

    /// Send one prompt and return the answer text or a fallback sentence.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = self.request_for(prompt);
        let url = format!("{}/{}:generateContent", self.base_url, self.model_path());
        debug!(
            "LLM request: model={}, prompt_chars={}, max_output_tokens={}, temp={}",
            self.config.model,
            prompt.len(),
            self.config.max_output_tokens,
            self.config.temperature,
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(from_status(status, &error_message(&text)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            trace!("Unparseable response body: {text}");
            GenerationError::Internal(format!("failed to parse response: {e}"))
        })?;

        if let Some(ref usage) = parsed.usage_metadata {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
                usage.total_token_count.unwrap_or(0),
            );
        }

        Ok(parsed.answer_text())
    }

    /// Verify the key and model by fetching the model's metadata.
    pub async fn check_model(&self) -> Result<ModelInfo, GenerationError> {
        let url = format!("{}/{}", self.base_url, self.model_path());
        let resp = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(from_status(status, &error_message(&text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| GenerationError::Internal(format!("failed to parse model info: {e}")))
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> GenerateFuture<'_> {
        let prompt = prompt.to_string();
        Box::pin(async move { self.generate_text(&prompt).await })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(format!("request timed out: {e}"))
    } else {
        classify_failure(format!("request failed: {e}"))
    }
}

/// Pull `error.message` out of an API error body, or fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}
