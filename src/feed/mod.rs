//! Live chat feed abstraction
//!
//! The feed is the remote message stream the bot reads from and posts into.
//! Every call made through it is expected to pass the resilient executor.

/// YouTube Data API implementation
pub mod youtube;

pub use youtube::YouTubeFeed;

use crate::bot::resilient::{Classify, FailureClass};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by a chat feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// Remote API answered with a non-success status
    #[error("HTTP {status}: {reason}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Machine-readable reason reported by the API, if any
        reason: String,
    },
    /// The live chat is over or does not exist
    #[error("Live chat ended: {0}")]
    ChatEnded(String),
    /// Connection or TLS failure
    #[error("Network error: {0}")]
    Network(String),
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),
    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Classify for FeedError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Http { status, .. } => FailureClass::from_status(*status),
            // A timed-out post may still have landed, so it is not retried
            Self::ChatEnded(_) | Self::Network(_) | Self::Timeout(_) | Self::Decode(_) => {
                FailureClass::Fatal
            }
        }
    }
}

/// Paid or support event attached to a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonetaryEvent {
    /// Amount as displayed to viewers, e.g. `"$5.00"`; absent for memberships
    pub amount_display: Option<String>,
}

/// A message received from the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Identifier, unique within the feed
    pub id: String,
    /// Author's channel identifier
    pub author_id: String,
    /// Author's display name
    pub author_name: String,
    /// Message text (may be empty for paid events without a comment)
    pub body: String,
    /// Present on super chats and other support events
    pub monetary: Option<MonetaryEvent>,
    /// When the message was published
    pub published_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether the message carries a monetary/support event
    #[must_use]
    pub const fn is_monetary(&self) -> bool {
        self.monetary.is_some()
    }
}

/// Remote live chat operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatFeed: Send + Sync {
    /// Fetch the messages that arrived since the previous call, oldest first
    async fn list_new_messages(&self, page_size: u32) -> Result<Vec<ChatMessage>, FeedError>;

    /// Post a text message (at most 500 characters)
    async fn post_message(&self, text: &str) -> Result<(), FeedError>;
}
