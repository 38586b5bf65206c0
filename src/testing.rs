//! Test fixtures and fakes.

use crate::feed::{ChatFeed, ChatMessage, FeedError, MonetaryEvent};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Plain text message from `author_id`, displayed as `User {author_id}`
#[must_use]
pub fn chat_message(id: &str, author_id: &str, body: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        author_id: author_id.to_string(),
        author_name: format!("User {author_id}"),
        body: body.to_string(),
        monetary: None,
        published_at: Utc::now(),
    }
}

/// Super chat with an optional displayed amount
#[must_use]
pub fn super_chat(id: &str, author_id: &str, amount: Option<&str>) -> ChatMessage {
    ChatMessage {
        monetary: Some(MonetaryEvent {
            amount_display: amount.map(ToString::to_string),
        }),
        ..chat_message(id, author_id, "")
    }
}

/// Feed that replays scripted pages and records every post.
///
/// Once the script runs out, fetches return empty pages.
pub struct RecordingFeed {
    pages: Mutex<VecDeque<Vec<ChatMessage>>>,
    posted: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl RecordingFeed {
    /// Feed returning `pages` in order
    #[must_use]
    pub fn new(pages: Vec<Vec<ChatMessage>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            posted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Texts posted so far
    #[must_use]
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of fetch calls
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatFeed for RecordingFeed {
    async fn list_new_messages(&self, _page_size: u32) -> Result<Vec<ChatMessage>, FeedError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .pages
            .lock()
            .map_or(None, |mut pages| pages.pop_front())
            .unwrap_or_default())
    }

    async fn post_message(&self, text: &str) -> Result<(), FeedError> {
        if let Ok(mut posted) = self.posted.lock() {
            posted.push(text.to_string());
        }
        Ok(())
    }
}
