//! The request pipeline: question → rate gate → context + question → generator.
//!
//! [`ToolChatbot`] is built once at startup and shared (behind an `Arc`)
//! with whatever front end drives it. The catalog and the rate window are
//! owned and lock-guarded by the components that hold them, so the chatbot
//! itself needs no `&mut self`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::TextGenerator;
use crate::api::error::GenerationError;
use crate::api::rate_limit::{Admission, RateLimiter, Throttled};
use crate::config::ChatConfig;
use crate::context::{ContextBuilder, compose_prompt};
use crate::dataset::{Dataset, DatasetStore};

/// Why a question got no answer.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The message was empty or whitespace only.
    #[error("Empty message")]
    EmptyMessage,
    /// Over quota under the fail-fast policy.
    #[error(transparent)]
    Throttled(#[from] Throttled),
    /// The generation call failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Point-in-time view of the chatbot, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStatus {
    pub tools: usize,
    pub dataset_version: u64,
    pub dataset_updated_at: DateTime<Utc>,
    pub model: String,
    pub context_limit: usize,
    pub requests_in_window: u32,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Question answering over the tool catalog.
pub struct ToolChatbot {
    store: DatasetStore,
    context: ContextBuilder,
    limiter: RateLimiter,
    generator: Arc<dyn TextGenerator>,
}

impl ToolChatbot {
    /// Assemble a chatbot from a loaded store, a generator and `config`'s
    /// context bound and rate limits.
    pub fn new(
        store: DatasetStore,
        generator: Arc<dyn TextGenerator>,
        config: &ChatConfig,
    ) -> Self {
        Self::from_parts(
            store,
            ContextBuilder::new(config.context_limit),
            RateLimiter::new(config.rate_limit_config()),
            generator,
        )
    }

    pub fn from_parts(
        store: DatasetStore,
        context: ContextBuilder,
        limiter: RateLimiter,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        info!(
            "Chatbot ready: model={}, tools={}, context_limit={}, rate={}/{}s",
            generator.model(),
            store.snapshot().len(),
            context.limit(),
            limiter.config().max_requests,
            limiter.config().window.as_secs(),
        );
        Self {
            store,
            context,
            limiter,
            generator,
        }
    }

    /// Answer one user message.
    ///
    /// The message is trimmed and rejected if empty before it reaches the
    /// rate gate. Blocked or empty model output is not an error; the
    /// generator already turned it into a fallback sentence.
    pub async fn answer(&self, message: &str) -> Result<String, ChatError> {
        let question = message.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if let Admission::Waited(waited) = self.limiter.acquire().await? {
            debug!("Admitted after {:.2}s rate-limit wait", waited.as_secs_f64());
        }

        info!("Processing query: {question}");
        let context = self.context.context_for(&self.store.snapshot());
        let prompt = compose_prompt(&context, question);
        debug!("Prompt length: {} characters", prompt.len());
        trace!("Full prompt sent to model:\n{prompt}");

        let start = Instant::now();
        match self.generator.generate(&prompt).await {
            Ok(text) => {
                debug!(
                    "Answered in {:.1}s ({} chars)",
                    start.elapsed().as_secs_f64(),
                    text.len()
                );
                Ok(text)
            }
            Err(e) => {
                error!(
                    kind = e.kind(),
                    "Error generating response for query '{question}': {e}"
                );
                Err(e.into())
            }
        }
    }

    /// Replace the catalog; see [`DatasetStore::replace`].
    pub fn update_dataset(&self, value: Value) -> bool {
        self.store.replace(value)
    }

    /// The catalog currently used for grounding.
    pub fn dataset(&self) -> Arc<Dataset> {
        self.store.snapshot()
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub async fn status(&self) -> ChatStatus {
        let dataset = self.store.snapshot();
        let window = self.limiter.snapshot();
        let limits = self.limiter.config();
        ChatStatus {
            tools: dataset.len(),
            dataset_version: dataset.version(),
            dataset_updated_at: self.store.updated_at(),
            model: self.generator.model().to_string(),
            context_limit: self.context.limit(),
            requests_in_window: window.count,
            max_requests: limits.max_requests,
            window_secs: limits.window.as_secs(),
        }
    }
}
