//! YouTube live chat over the Data API v3 `liveChat/messages` endpoints.

use super::{ChatFeed, ChatMessage, FeedError, MonetaryEvent};
use crate::config::{AppConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// API error reasons meaning the chat can no longer be polled
const CHAT_ENDED_REASONS: &[&str] = &["liveChatEnded", "liveChatNotFound", "liveChatDisabled"];

/// Paid and membership event types; they are replied to with a thank-you
const SUPPORT_EVENT_TYPES: &[&str] = &[
    "superChatEvent",
    "superStickerEvent",
    "newSponsorEvent",
    "memberMilestoneChatEvent",
    "membershipGiftingEvent",
];

/// Creates an HTTP client that gives up on a request after `timeout`.
fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// What the bot has posted so far, learned from insert responses
#[derive(Debug, Default)]
struct OwnPosts {
    channel_id: Option<String>,
    message_ids: HashSet<String>,
}

/// Chat feed backed by the YouTube Data API
pub struct YouTubeFeed {
    http: Client,
    api_base: String,
    live_chat_id: String,
    access_token: Option<String>,
    api_key: Option<String>,
    next_page_token: Mutex<Option<String>>,
    own_posts: Mutex<OwnPosts>,
}

impl YouTubeFeed {
    /// Create a feed for the given live chat
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        live_chat_id: impl Into<String>,
        access_token: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http: http_client(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            live_chat_id: live_chat_id.into(),
            access_token,
            api_key,
            next_page_token: Mutex::new(None),
            own_posts: Mutex::new(OwnPosts::default()),
        }
    }

    /// Replace the per-request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    /// Create a feed from process configuration
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.youtube_api_base.clone(),
            config.live_chat_id.clone(),
            config.youtube_access_token.clone(),
            config.youtube_api_key.clone(),
        )
        .with_request_timeout(config.request_timeout())
    }

    fn endpoint(&self) -> String {
        format!("{}/liveChat/messages", self.api_base)
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key.as_str())]);
        }
        req
    }

    fn page_token(&self) -> Option<String> {
        self.next_page_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_page_token(&self, token: Option<String>) {
        *self
            .next_page_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn remember_own_post(&self, posted: InsertResponse) {
        let mut own = self.own_posts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = posted.id {
            own.message_ids.insert(id);
        }
        let channel = posted
            .snippet
            .and_then(|s| s.author_channel_id)
            .or_else(|| posted.author_details.map(|a| a.channel_id))
            .filter(|c| !c.is_empty());
        if channel.is_some() && own.channel_id.is_none() {
            debug!("Learned own channel id from posted message");
            own.channel_id = channel;
        }
    }

    fn is_own_post(&self, item: &LiveChatItem) -> bool {
        let own = self.own_posts.lock().unwrap_or_else(PoisonError::into_inner);
        own.message_ids.contains(&item.id)
            || own
                .channel_id
                .as_deref()
                .is_some_and(|c| c == item.author_details.channel_id)
    }
}

#[async_trait]
impl ChatFeed for YouTubeFeed {
    async fn list_new_messages(&self, page_size: u32) -> Result<Vec<ChatMessage>, FeedError> {
        let mut req = self.http.get(self.endpoint()).query(&[
            ("liveChatId", self.live_chat_id.as_str()),
            ("part", "snippet,authorDetails"),
        ]);
        req = req.query(&[("maxResults", page_size)]);
        if let Some(token) = self.page_token() {
            req = req.query(&[("pageToken", token)]);
        }

        let resp = check_status(send(self.authorize(req)).await?).await?;
        let page: ListResponse = resp
            .json()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        let total = page.items.len();
        if page.next_page_token.is_some() {
            self.set_page_token(page.next_page_token);
        }

        // Moderation notices, polls and the bot's own echoes are not chat to answer
        let messages: Vec<ChatMessage> = page
            .items
            .into_iter()
            .filter(|item| item.snippet.is_replyable() && !self.is_own_post(item))
            .map(ChatMessage::from)
            .collect();

        debug!(
            items = total,
            kept = messages.len(),
            "Fetched live chat page"
        );
        Ok(messages)
    }

    async fn post_message(&self, text: &str) -> Result<(), FeedError> {
        let body = InsertRequest {
            snippet: InsertSnippet {
                live_chat_id: &self.live_chat_id,
                kind: "textMessageEvent",
                text_message_details: TextMessageDetails {
                    message_text: text.to_string(),
                },
            },
        };
        let req = self
            .http
            .post(self.endpoint())
            .query(&[("part", "snippet")])
            .json(&body);

        let resp = check_status(send(self.authorize(req)).await?).await?;
        let raw = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<InsertResponse>(&raw) {
            Ok(posted) => self.remember_own_post(posted),
            Err(e) => debug!("Insert response not decoded: {e}"),
        }
        Ok(())
    }
}

async fn send(req: RequestBuilder) -> Result<Response, FeedError> {
    req.send().await.map_err(|e| {
        if e.is_timeout() {
            FeedError::Timeout(e.to_string())
        } else {
            FeedError::Network(e.to_string())
        }
    })
}

/// Turn non-success responses into a [`FeedError`] carrying the API reason
async fn check_status(resp: Response) -> Result<Response, FeedError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let reason = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error.errors.into_iter().find_map(|d| d.reason))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

    if CHAT_ENDED_REASONS.contains(&reason.as_str()) {
        return Err(FeedError::ChatEnded(reason));
    }
    Err(FeedError::Http {
        status: status.as_u16(),
        reason,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<LiveChatItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    author_details: AuthorDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(rename = "type", default)]
    kind: String,
    published_at: Option<String>,
    display_message: Option<String>,
    text_message_details: Option<TextMessageIn>,
    super_chat_details: Option<AmountDetails>,
    super_sticker_details: Option<AmountDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextMessageIn {
    message_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountDetails {
    amount_display_string: Option<String>,
    user_comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResponse {
    id: Option<String>,
    snippet: Option<InsertedSnippet>,
    author_details: Option<AuthorDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedSnippet {
    author_channel_id: Option<String>,
}

#[derive(Serialize)]
struct InsertRequest<'a> {
    snippet: InsertSnippet<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertSnippet<'a> {
    live_chat_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text_message_details: TextMessageDetails,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextMessageDetails {
    message_text: String,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl Snippet {
    fn is_replyable(&self) -> bool {
        self.kind == "textMessageEvent" || SUPPORT_EVENT_TYPES.contains(&self.kind.as_str())
    }

    fn monetary(&self) -> Option<MonetaryEvent> {
        let details = match self.kind.as_str() {
            "superChatEvent" => self.super_chat_details.as_ref(),
            "superStickerEvent" => self.super_sticker_details.as_ref(),
            "newSponsorEvent" | "memberMilestoneChatEvent" | "membershipGiftingEvent" => {
                return Some(MonetaryEvent {
                    amount_display: None,
                })
            }
            _ => return None,
        };
        Some(MonetaryEvent {
            amount_display: details.and_then(|d| non_empty(d.amount_display_string.clone())),
        })
    }

    fn body(&self) -> String {
        non_empty(self.display_message.clone())
            .or_else(|| {
                self.text_message_details
                    .as_ref()
                    .and_then(|t| non_empty(t.message_text.clone()))
            })
            .or_else(|| {
                self.super_chat_details
                    .as_ref()
                    .and_then(|d| non_empty(d.user_comment.clone()))
            })
            .unwrap_or_default()
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.published_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc))
    }
}

impl From<LiveChatItem> for ChatMessage {
    fn from(item: LiveChatItem) -> Self {
        Self {
            monetary: item.snippet.monetary(),
            body: item.snippet.body(),
            published_at: item.snippet.published_at(),
            id: item.id,
            author_id: item.author_details.channel_id,
            author_name: item.author_details.display_name,
        }
    }
}
