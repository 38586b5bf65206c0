//! Decides whether and where an incoming message is queued.

use super::ledger::SeenAuthors;
use super::queue::{DualQueue, Lane, PendingReply};
use crate::feed::ChatMessage;
use crate::settings::{ResponseMode, Settings};
use crate::utils::contains_ignore_case;
use tracing::debug;

/// Outcome of classifying one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Author is blacklisted; nothing was queued
    Blacklisted,
    /// Posted by the bot itself; nothing was queued
    OwnMessage,
    /// A reply was queued in `lane`
    Queued {
        /// Lane the reply went to
        lane: Lane,
        /// Whether a welcome was queued as well
        welcomed: bool,
    },
    /// The response mode does not cover this message
    Filtered {
        /// Whether a welcome was queued anyway
        welcomed: bool,
    },
}

impl Classification {
    /// Whether a welcome was queued for the author
    #[must_use]
    pub const fn welcomed(&self) -> bool {
        matches!(
            self,
            Self::Queued { welcomed: true, .. } | Self::Filtered { welcomed: true }
        )
    }

    /// Whether the message was dropped before reaching any lane
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Blacklisted | Self::OwnMessage)
    }
}

/// Routes messages into the [`DualQueue`]
#[derive(Debug, Clone)]
pub struct Classifier {
    bot_name: String,
    bot_channel_id: Option<String>,
}

impl Classifier {
    /// Create a classifier for a bot answering to `bot_name`
    #[must_use]
    pub fn new(bot_name: impl Into<String>, bot_channel_id: Option<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            bot_channel_id,
        }
    }

    /// Classify `message` and queue whatever it calls for.
    ///
    /// Blacklisted authors are dropped before anything else. A first-time
    /// author is recorded in `authors` before a welcome is queued, and the
    /// welcome does not depend on the response mode.
    pub fn classify(
        &self,
        message: ChatMessage,
        settings: &Settings,
        authors: &mut SeenAuthors,
        queue: &mut DualQueue,
    ) -> Classification {
        if settings.is_blacklisted(&message.author_id) {
            debug!("Dropping message {} from blacklisted author", message.id);
            return Classification::Blacklisted;
        }
        if self
            .bot_channel_id
            .as_deref()
            .is_some_and(|own| own == message.author_id)
        {
            return Classification::OwnMessage;
        }

        let first_time = authors.insert(&message.author_id);
        let welcomed = first_time && settings.auto_greet;
        if welcomed {
            queue.enqueue(
                Lane::Priority,
                PendingReply::Welcome {
                    author_id: message.author_id.clone(),
                    author_name: message.author_name.clone(),
                },
            );
        }

        match self.lane_for(&message, settings) {
            Some(lane) => {
                queue.enqueue(lane, PendingReply::Respond(message));
                Classification::Queued { lane, welcomed }
            }
            None => {
                debug!("Message {} not covered by response mode", message.id);
                Classification::Filtered { welcomed }
            }
        }
    }

    fn lane_for(&self, message: &ChatMessage, settings: &Settings) -> Option<Lane> {
        if message.is_monetary() || settings.is_vip(&message.author_id) {
            return Some(Lane::Priority);
        }
        match settings.response_mode {
            ResponseMode::All => Some(Lane::Normal),
            ResponseMode::Mentions if contains_ignore_case(&message.body, &self.bot_name) => {
                Some(Lane::Normal)
            }
            ResponseMode::Mentions | ResponseMode::Vip => None,
        }
    }
}
