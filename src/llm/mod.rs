//! Reply generation
//!
//! The generator is an injected capability: the dispatcher only sees the
//! [`ReplyGenerator`] trait, so tests can swap in fakes.

mod openai;
/// Prompt shaping from runtime settings
pub mod prompt;

pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during reply generation
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// The provider returned no usable text
    #[error("Empty response")]
    EmptyResponse,
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Produces reply text for a chat message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply to `prompt` following the `system_prompt` instructions
    async fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String, LlmError>;
}
