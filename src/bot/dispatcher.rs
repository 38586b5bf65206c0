//! Turns queued items into replies and posts them.
//!
//! Super chats and welcomes use fixed templates; everything else goes
//! through the injected [`ReplyGenerator`]. Every reply is cut to the
//! transport limit and posted through the [`ResilientExecutor`]. A failed
//! post is logged and the item discarded; it is never requeued. Items the
//! pass never reached go back to the front of their lanes.

use super::queue::{DualQueue, PendingReply};
use super::resilient::{CallError, ResilientExecutor};
use crate::config::{GENERATION_FALLBACK_REPLY, MAX_REPLY_CHARS};
use crate::feed::{ChatFeed, ChatMessage, FeedError, MonetaryEvent};
use crate::llm::{prompt, ReplyGenerator};
use crate::settings::Settings;
use crate::utils::truncate_chars;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Acknowledgement for a paid event.
///
/// Falls back to a generic thank-you when the amount is missing.
///
/// # Examples
///
/// ```
/// use livechat_bot::bot::dispatcher::super_chat_reply;
/// use livechat_bot::feed::MonetaryEvent;
///
/// let event = MonetaryEvent { amount_display: Some("$5.00".into()) };
/// assert_eq!(super_chat_reply("Bob", &event), "Thanks Bob for the $5.00 Super Chat! 🙌");
/// ```
#[must_use]
pub fn super_chat_reply(author_name: &str, event: &MonetaryEvent) -> String {
    match event.amount_display.as_deref() {
        Some(amount) => format!("Thanks {author_name} for the {amount} Super Chat! 🙌"),
        None => format!("Thanks {author_name} for the support! 💖"),
    }
}

/// Greeting for a first-time author
#[must_use]
pub fn welcome_reply(author_name: &str) -> String {
    format!("Welcome to the stream, {author_name}! 👋")
}

/// Counters for one dispatch pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Replies posted
    pub sent: usize,
    /// Replies that could not be posted
    pub failed: usize,
    /// Items put back in the queue unattempted after the quota ran out
    pub requeued: usize,
    /// Whether the pass stopped on quota exhaustion
    pub quota_exhausted: bool,
}

/// Composes and posts replies
pub struct Dispatcher {
    generator: Arc<dyn ReplyGenerator>,
    executor: ResilientExecutor,
    generation_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        generator: Arc<dyn ReplyGenerator>,
        executor: ResilientExecutor,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            executor,
            generation_timeout,
        }
    }

    /// Send up to `max_n` queued replies, priority lane first.
    ///
    /// Stops early when the feed reports quota exhaustion. Only the item whose
    /// post failed is dropped; the rest of the batch returns to the queue in
    /// its original order.
    #[instrument(skip_all, fields(queued = queue.len(), max_n = max_n))]
    pub async fn dispatch(
        &self,
        feed: &dyn ChatFeed,
        queue: &mut DualQueue,
        settings: &Settings,
        max_n: usize,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut batch = queue.take_batch(max_n).into_iter();

        for (_, item) in batch.by_ref() {
            let reply = self.compose(&item, settings).await;
            match self.send(feed, &reply).await {
                Ok(()) => report.sent += 1,
                Err(CallError::QuotaExhausted(e)) => {
                    report.failed += 1;
                    report.quota_exhausted = true;
                    warn!("Quota exhausted while sending replies: {e}");
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Dropping reply after send failure: {e}");
                }
            }
        }

        let unsent: Vec<_> = batch.collect();
        report.requeued = unsent.len();
        if report.requeued > 0 {
            info!("Requeued {} unsent replies", report.requeued);
            queue.requeue_front(unsent);
        }
        report
    }

    /// Build the reply text for one item, never longer than the transport limit
    pub async fn compose(&self, item: &PendingReply, settings: &Settings) -> String {
        let reply = match item {
            PendingReply::Welcome { author_name, .. } => welcome_reply(author_name),
            PendingReply::Respond(message) => match &message.monetary {
                Some(event) => super_chat_reply(&message.author_name, event),
                None => self.generate(message, settings).await,
            },
        };
        truncate_chars(reply, MAX_REPLY_CHARS)
    }

    async fn generate(&self, message: &ChatMessage, settings: &Settings) -> String {
        let system = prompt::system_prompt(settings);
        let user = prompt::user_prompt(message);

        match tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(&system, &user),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!("Response generation failed: {e}");
                GENERATION_FALLBACK_REPLY.to_string()
            }
            Err(_) => {
                error!(
                    "Response generation timed out after {}s",
                    self.generation_timeout.as_secs()
                );
                GENERATION_FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn send(&self, feed: &dyn ChatFeed, text: &str) -> Result<(), CallError<FeedError>> {
        debug!("Posting reply ({} chars)", text.chars().count());
        self.executor
            .execute("post_message", || feed.post_message(text))
            .await?;
        info!("Reply sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::queue::Lane;
    use crate::feed::MockChatFeed;
    use crate::llm::{LlmError, MockReplyGenerator};
    use crate::testing::{chat_message, super_chat};
    use mockall::Sequence;

    fn dispatcher(generator: MockReplyGenerator) -> Dispatcher {
        Dispatcher::new(
            Arc::new(generator),
            ResilientExecutor::default(),
            Duration::from_secs(5),
        )
    }

    fn unused_generator() -> MockReplyGenerator {
        let mut generator = MockReplyGenerator::new();
        generator.expect_generate().never();
        generator
    }

    #[test]
    fn test_super_chat_templates() {
        let paid = MonetaryEvent {
            amount_display: Some("₹100.00".into()),
        };
        let reply = super_chat_reply("Bob", &paid);
        assert!(reply.contains("Bob"));
        assert!(reply.contains("₹100.00"));

        let unpaid = MonetaryEvent {
            amount_display: None,
        };
        assert_eq!(
            super_chat_reply("Bob", &unpaid),
            "Thanks Bob for the support! 💖"
        );
    }

    #[tokio::test]
    async fn test_compose_uses_generator_with_settings_tone() {
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .withf(|system, user| system.contains("hinglish") && user == "User UCa: hi bot")
            .times(1)
            .returning(|_, _| Ok("hello!".to_string()));

        let reply = dispatcher(generator)
            .compose(
                &PendingReply::Respond(chat_message("m1", "UCa", "hi bot")),
                &Settings::default(),
            )
            .await;
        assert_eq!(reply, "hello!");
    }

    #[tokio::test]
    async fn test_generator_failure_becomes_apology() {
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(LlmError::ApiError("boom".to_string())));

        let reply = dispatcher(generator)
            .compose(
                &PendingReply::Respond(chat_message("m1", "UCa", "hi")),
                &Settings::default(),
            )
            .await;
        assert_eq!(reply, GENERATION_FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_long_generation_is_truncated() {
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Ok("y".repeat(2000)));

        let reply = dispatcher(generator)
            .compose(
                &PendingReply::Respond(chat_message("m1", "UCa", "hi")),
                &Settings::default(),
            )
            .await;
        assert_eq!(reply.chars().count(), MAX_REPLY_CHARS);
    }

    #[tokio::test]
    async fn test_super_chat_skips_generator() {
        let reply = dispatcher(unused_generator())
            .compose(
                &PendingReply::Respond(super_chat("m1", "UCb", Some("$5.00"))),
                &Settings::default(),
            )
            .await;
        assert_eq!(reply, "Thanks User UCb for the $5.00 Super Chat! 🙌");
    }

    #[tokio::test]
    async fn test_dispatch_sends_priority_first_and_respects_limit() {
        let mut feed = MockChatFeed::new();
        let mut seq = Sequence::new();
        feed.expect_post_message()
            .withf(|text| text == "Welcome to the stream, Alice! 👋")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        feed.expect_post_message()
            .withf(|text| text == "Thanks Bob for the support! 💖")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut queue = DualQueue::new();
        queue.enqueue(
            Lane::Normal,
            PendingReply::Respond(chat_message("m3", "UCc", "later")),
        );
        queue.enqueue(
            Lane::Priority,
            PendingReply::Welcome {
                author_id: "UCa".into(),
                author_name: "Alice".into(),
            },
        );
        let mut paid = super_chat("m2", "UCb", None);
        paid.author_name = "Bob".into();
        queue.enqueue(Lane::Priority, PendingReply::Respond(paid));

        let report = dispatcher(unused_generator())
            .dispatch(&feed, &mut queue, &Settings::default(), 2)
            .await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(queue.lane_len(Lane::Normal), 1);
    }

    #[tokio::test]
    async fn test_send_failure_drops_message() {
        let mut feed = MockChatFeed::new();
        feed.expect_post_message().times(2).returning(|text| {
            if text.starts_with("Welcome") {
                Err(FeedError::Http {
                    status: 400,
                    reason: "invalidMessage".into(),
                })
            } else {
                Ok(())
            }
        });

        let mut queue = DualQueue::new();
        queue.enqueue(
            Lane::Priority,
            PendingReply::Welcome {
                author_id: "UCa".into(),
                author_name: "Alice".into(),
            },
        );
        queue.enqueue(
            Lane::Priority,
            PendingReply::Respond(super_chat("m2", "UCb", Some("$2.00"))),
        );

        let report = dispatcher(unused_generator())
            .dispatch(&feed, &mut queue, &Settings::default(), 10)
            .await;

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_quota_stops_the_pass() {
        let mut feed = MockChatFeed::new();
        feed.expect_post_message().times(1).returning(|_| {
            Err(FeedError::Http {
                status: 403,
                reason: "quotaExceeded".into(),
            })
        });

        let mut queue = DualQueue::new();
        for id in ["m1", "m2", "m3"] {
            queue.enqueue(
                Lane::Priority,
                PendingReply::Respond(super_chat(id, "UCb", Some("$1.00"))),
            );
        }

        let report = dispatcher(unused_generator())
            .dispatch(&feed, &mut queue, &Settings::default(), 3)
            .await;

        assert!(report.quota_exhausted);
        assert_eq!(report.failed, 1);
        assert_eq!(report.requeued, 2);
        assert_eq!(report.sent, 0);
        // Only the failed post is lost; the untried thanks wait for the next pass
        let left: Vec<_> = queue
            .iter_lane(Lane::Priority)
            .filter_map(|item| match item {
                PendingReply::Respond(message) => Some(message.id.as_str()),
                PendingReply::Welcome { .. } => None,
            })
            .collect();
        assert_eq!(left, vec!["m2", "m3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_times_out() {
        struct Stalled;

        #[async_trait::async_trait]
        impl ReplyGenerator for Stalled {
            async fn generate(&self, _: &str, _: &str) -> Result<String, LlmError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
        }

        let dispatcher = Dispatcher::new(
            Arc::new(Stalled),
            ResilientExecutor::default(),
            Duration::from_secs(10),
        );
        let reply = dispatcher
            .compose(
                &PendingReply::Respond(chat_message("m1", "UCa", "hi")),
                &Settings::default(),
            )
            .await;
        assert_eq!(reply, GENERATION_FALLBACK_REPLY);
    }
}
