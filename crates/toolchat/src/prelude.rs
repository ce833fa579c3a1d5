//! Convenience re-exports for common `toolchat` types.
//!
//! ```ignore
//! use toolchat::prelude::*;
//! ```
//!
//! Pulls in what a front end needs to stand up the pipeline: the config,
//! the store, the Gemini client, the chatbot and its error type. Wire types
//! and the individual rendering helpers stay in their modules.

pub use crate::{GenerateFuture, TextGenerator};

pub use crate::api::{
    GeminiClient, GenerationConfig, GenerationError, RateLimitConfig, RateLimiter, ThrottlePolicy,
    Throttled, classify_failure,
};
pub use crate::chatbot::{ChatError, ChatStatus, ToolChatbot};
pub use crate::config::{ChatArgs, ChatConfig};
pub use crate::context::ContextBuilder;
pub use crate::dataset::{Dataset, DatasetStore, ToolRecord};
