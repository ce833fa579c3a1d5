//! Chatbot configuration with the defaults the service runs with.
//!
//! [`ChatConfig`] collects every tunable in one place and converts itself
//! into the per-component configs via [`generation_config`](ChatConfig::generation_config)
//! and [`rate_limit_config`](ChatConfig::rate_limit_config). [`ChatArgs`] is
//! the matching set of command-line flags, flattened into both binaries.

use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_MODEL;
use crate::api::gemini::{GenerationConfig, HarmBlockThreshold, safety_settings};
use crate::api::rate_limit::{RateLimitConfig, ThrottlePolicy};
use crate::context::DEFAULT_CONTEXT_LIMIT;

/// Default location of the tool catalog.
pub const DEFAULT_DATASET_PATH: &str = "data/tools_dataset.json";

/// Configuration for a chatbot instance.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Catalog file. Default: `data/tools_dataset.json`.
    pub dataset_path: PathBuf,
    /// Model identifier. Default: `"gemini-1.5-flash"`.
    pub model: String,
    /// Sampling temperature. Default: `0.0`.
    pub temperature: f32,
    /// Maximum output tokens per answer. Default: `10000`.
    pub max_output_tokens: u32,
    /// Threshold for the harassment and hate-speech categories. Default: block only high.
    pub safety_threshold: HarmBlockThreshold,
    /// Records rendered into the context block. Default: `500`.
    pub context_limit: usize,
    /// Generation calls admitted per window. Default: `50`.
    pub max_requests: u32,
    /// Rate window length. Default: 60 seconds.
    pub window: Duration,
    /// Over-quota behaviour. Default: block.
    pub throttle_policy: ThrottlePolicy,
    /// Timeout for one generation call. Default: 60 seconds.
    pub request_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_output_tokens: 10_000,
            safety_threshold: HarmBlockThreshold::BlockOnlyHigh,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            max_requests: 50,
            window: Duration::from_secs(60),
            throttle_policy: ThrottlePolicy::Block,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ChatConfig {
    /// Parameters for the [`GeminiClient`](crate::api::gemini::GeminiClient).
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            safety_settings: safety_settings(self.safety_threshold),
            timeout: self.request_timeout,
        }
    }

    /// Parameters for the [`RateLimiter`](crate::api::rate_limit::RateLimiter).
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.max_requests,
            window: self.window,
            policy: self.throttle_policy,
        }
    }
}

/// Command-line flags shared by the `toolchat` and `toolchat-web` binaries.
#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Path to the JSON tool catalog.
    #[arg(long, default_value = DEFAULT_DATASET_PATH)]
    pub dataset: PathBuf,

    /// Gemini model to use.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum tokens per answer.
    #[arg(long, default_value_t = 10_000)]
    pub max_output_tokens: u32,

    /// Blocking threshold for harassment and hate speech.
    #[arg(long, value_enum, default_value_t = HarmBlockThreshold::BlockOnlyHigh)]
    pub safety_threshold: HarmBlockThreshold,

    /// Number of catalog records rendered into the prompt.
    #[arg(long, default_value_t = DEFAULT_CONTEXT_LIMIT)]
    pub context_limit: usize,

    /// Generation calls allowed per rate window.
    #[arg(long, default_value_t = 50)]
    pub max_requests: u32,

    /// Rate window length in seconds.
    #[arg(long, default_value_t = 60)]
    pub window_secs: u64,

    /// What to do with calls over the window's quota.
    #[arg(long, value_enum, default_value_t = ThrottlePolicy::Block)]
    pub throttle: ThrottlePolicy,

    /// Timeout for one generation call, in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        Self {
            dataset_path: args.dataset,
            model: args.model,
            temperature: args.temperature,
            max_output_tokens: args.max_output_tokens,
            safety_threshold: args.safety_threshold,
            context_limit: args.context_limit,
            max_requests: args.max_requests,
            window: Duration::from_secs(args.window_secs),
            throttle_policy: args.throttle,
            request_timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}
