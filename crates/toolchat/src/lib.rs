//! Grounded question answering over a manufacturing tool catalog.
//!
//! `toolchat` loads a JSON catalog of tool records, renders a bounded prefix
//! of it into a fixed-template context block, and forwards that block plus a
//! user question to the Gemini Generative Language API. The answer text (or
//! a fixed fallback when the service returns nothing usable) is handed back
//! to the caller.
//!
//! The core abstraction is [`ToolChatbot`](chatbot::ToolChatbot), an
//! explicitly constructed service object that owns the dataset, the context
//! renderer, a fixed-window rate limiter and a [`TextGenerator`].
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use toolchat::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = ChatConfig::default();
//!     let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| "GEMINI_API_KEY not set")?;
//!     let client = GeminiClient::new(api_key, config.generation_config())?;
//!
//!     let store = DatasetStore::open(&config.dataset_path);
//!     let bot = ToolChatbot::new(store, Arc::new(client), &config);
//!
//!     let answer = bot.answer("What is the status of tool T-100?").await
//!         .map_err(|e| e.to_string())?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Catalog loading and replacement:** [`dataset::DatasetStore`]. Loading
//!   never fails (a broken file degrades to an empty catalog); replacement
//!   validates, writes through a temp file and swaps the in-memory snapshot.
//!
//! - **Prompt grounding:** [`context::build_context`] renders records,
//!   [`context::compose_prompt`] appends the question, and
//!   [`context::ContextBuilder`] caches the rendered block per dataset version.
//!
//! - **Backpressure:** [`api::rate_limit::RateLimiter`]: a single fixed-window
//!   counter that either suspends or rejects callers over quota.
//!
//! - **The external call:** [`api::gemini::GeminiClient`] and the
//!   [`api::error::GenerationError`] classification.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dataset`] | [`Dataset`](dataset::Dataset), [`DatasetStore`](dataset::DatasetStore) |
//! | [`context`] | Record rendering, context block, prompt composition, caching |
//! | [`api`] | Gemini client, error classification, rate limiting |
//! | [`chatbot`] | [`ToolChatbot`](chatbot::ToolChatbot) pipeline and [`ChatError`](chatbot::ChatError) |
//! | [`config`] | [`ChatConfig`](config::ChatConfig) defaults and shared CLI flags |
//! | [`logging`] | `tracing-subscriber` setup for the binaries |

pub mod api;
pub mod chatbot;
pub mod config;
pub mod context;
pub mod dataset;
pub mod logging;
pub mod prelude;

use std::future::Future;
use std::pin::Pin;

use crate::api::error::GenerationError;

// ── Constants ──────────────────────────────────────────────────────

/// Base URL of the Generative Language REST API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for all generation calls.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Environment variable the binaries read the API key from.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ── Generator seam ─────────────────────────────────────────────────

/// Boxed future returned by [`TextGenerator::generate`].
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// Anything that turns a composed prompt into answer text.
///
/// [`GeminiClient`](api::gemini::GeminiClient) is the production
/// implementation. Empty or safety-blocked output is not an error: the
/// implementation returns a fallback sentence instead, so only transport,
/// quota and availability failures surface as [`GenerationError`].
///
/// Uses a boxed future so that the trait is dyn-compatible and the chatbot
/// can hold an `Arc<dyn TextGenerator>`.
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` to the service and return its primary text output.
    fn generate(&self, prompt: &str) -> GenerateFuture<'_>;

    /// Model identifier used for every call.
    fn model(&self) -> &str;
}
