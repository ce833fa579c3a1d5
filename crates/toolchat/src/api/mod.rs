//! API interaction layer: the Gemini client, failure classification, and
//! the request gate in front of it.
//!
//! These modules handle everything between the
//! [`ToolChatbot`](crate::chatbot::ToolChatbot) pipeline and the Generative
//! Language API:
//!
//! - [`gemini`]: request/response wire types and [`GeminiClient`], the
//!   production [`TextGenerator`](crate::TextGenerator). Blocked or empty
//!   output turns into a fixed fallback sentence.
//! - [`error`]: [`GenerationError`] and [`classify_failure`], the single
//!   place where free-text service errors are mapped to a failure kind.
//! - [`rate_limit`]: fixed-window [`RateLimiter`] with block or fail-fast
//!   [`ThrottlePolicy`].

pub mod error;
pub mod gemini;
pub mod rate_limit;

// Re-export commonly used items at the module level.
pub use error::{GenerationError, classify_failure};
pub use gemini::{
    GeminiClient, GenerationConfig, HarmBlockThreshold, HarmCategory, SafetySetting,
};
pub use rate_limit::{
    Admission, RateLimitConfig, RateLimiter, RateWindow, ThrottlePolicy, Throttled,
};
