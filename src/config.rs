//! Configuration and constants
//!
//! Loads process configuration from config files and environment variables
//! and defines the engine's fixed limits.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process configuration loaded at startup
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Base URL of the YouTube Data API
    #[serde(default = "default_youtube_api_base")]
    pub youtube_api_base: String,
    /// OAuth access token used for the `Authorization` header
    pub youtube_access_token: Option<String>,
    /// API key appended as `key=` query parameter
    pub youtube_api_key: Option<String>,
    /// Live chat to poll and post into
    pub live_chat_id: String,

    /// Name the bot answers to in `mentions` mode
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Channel the bot posts as; its own messages are ignored
    pub bot_channel_id: Option<String>,

    /// Messages requested per fetch
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on replies sent per poll cycle
    #[serde(default = "default_max_replies_per_cycle")]
    pub max_replies_per_cycle: usize,
    /// Upper bound on replies waiting in the normal lane; the oldest is dropped beyond it
    #[serde(default = "default_normal_lane_capacity")]
    pub normal_lane_capacity: usize,
    /// Timeout for each YouTube API request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Location of the persisted runtime settings
    #[serde(default = "default_settings_path")]
    pub settings_path: String,

    /// OpenAI-compatible endpoint for reply generation
    #[serde(default = "default_llm_api_base")]
    pub llm_api_base: String,
    /// API key for the reply generator
    pub llm_api_key: Option<String>,
    /// Model used for replies
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Completion token limit
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,
    /// Upper bound on a single generation call, in seconds
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

fn default_youtube_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_bot_name() -> String {
    "bot".to_string()
}

const fn default_page_size() -> u32 {
    50
}

const fn default_max_replies_per_cycle() -> usize {
    5
}

const fn default_normal_lane_capacity() -> usize {
    DEFAULT_NORMAL_LANE_CAPACITY
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    100
}

const fn default_llm_temperature() -> f32 {
    0.7
}

const fn default_generation_timeout_secs() -> u64 {
    30
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any present source fails to parse.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `APP__PAGE_SIZE=20 ./target/livechat-bot`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map onto snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use livechat_bot::config::AppConfig;
    ///
    /// let config = AppConfig::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or `live_chat_id` is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Timeout applied to each reply generation call
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Timeout applied to each chat API request
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Maximum reply length accepted by the live chat transport, in characters
pub const MAX_REPLY_CHARS: usize = 500;

/// Attempts per remote call, the first one included
pub const RETRY_MAX_ATTEMPTS: usize = 5;
/// Delay before the first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
/// Factor applied to the delay after each retry
pub const RETRY_BACKOFF_MULTIPLIER: u32 = 2;

/// Default size limit of the normal reply lane
pub const DEFAULT_NORMAL_LANE_CAPACITY: usize = 20;
/// Default per-request timeout for the chat API
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Floor for the inter-cycle sleep
pub const MIN_POLLING_INTERVAL_SECS: u64 = 1;

/// Reply used when the generator fails or times out
pub const GENERATION_FALLBACK_REPLY: &str =
    "Sorry, couldn't process your request. Please try again!";
