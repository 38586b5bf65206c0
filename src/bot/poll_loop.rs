//! The poll loop: fetch, classify, dispatch, sleep, until stopped.
//!
//! One cycle runs to completion before the next begins, so the ledger, the
//! author set and the queue are only ever touched by a single task. A stop
//! request is observed between cycles (including during the sleep), never
//! in the middle of one.

use super::classifier::{Classification, Classifier};
use super::dispatcher::{DispatchReport, Dispatcher};
use super::ledger::{DedupLedger, SeenAuthors};
use super::queue::DualQueue;
use super::resilient::{CallError, ResilientExecutor};
use crate::feed::{ChatFeed, ChatMessage, FeedError};
use crate::settings::{save_best_effort, Settings, SettingsStore};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Failures that end the poll loop
#[derive(Debug, Error)]
pub enum BotError {
    /// The live chat is over; polling further is pointless
    #[error("Live chat ended: {0}")]
    ChatEnded(String),
}

/// Phase of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Fetching new messages from the feed
    Fetching,
    /// Deduplicating and routing fetched messages
    Classifying,
    /// Sending queued replies
    Dispatching,
    /// Waiting for the next cycle
    Sleeping,
    /// Persisting settings before exit
    ShuttingDown,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "FETCHING",
            Self::Classifying => "CLASSIFYING",
            Self::Dispatching => "DISPATCHING",
            Self::Sleeping => "SLEEPING",
            Self::ShuttingDown => "SHUTTING_DOWN",
        };
        f.write_str(name)
    }
}

/// Mutable state carried from cycle to cycle
#[derive(Debug, Default)]
pub struct BotContext {
    /// Runtime settings, read at startup
    pub settings: Settings,
    /// Messages already handled
    pub ledger: DedupLedger,
    /// Authors already recorded
    pub authors: SeenAuthors,
    /// Replies waiting to be sent
    pub queue: DualQueue,
}

impl BotContext {
    /// Fresh context around the loaded settings
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }
}

/// Counters for one cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages returned by the feed
    pub fetched: usize,
    /// Messages skipped as already handled
    pub duplicates: usize,
    /// Messages dropped (blacklisted or own)
    pub dropped: usize,
    /// Messages whose reply was queued
    pub queued: usize,
    /// Messages outside the response mode
    pub filtered: usize,
    /// Welcomes queued
    pub welcomed: usize,
    /// Outcome of the dispatch pass
    pub dispatch: DispatchReport,
}

/// Orchestrates fetch, classification and dispatch on a fixed cadence
pub struct PollLoop {
    feed: Arc<dyn ChatFeed>,
    store: Arc<dyn SettingsStore>,
    classifier: Classifier,
    dispatcher: Dispatcher,
    executor: ResilientExecutor,
    page_size: u32,
    max_replies_per_cycle: usize,
    state: LoopState,
}

impl PollLoop {
    /// Wire the loop to its collaborators
    #[must_use]
    pub fn new(
        feed: Arc<dyn ChatFeed>,
        store: Arc<dyn SettingsStore>,
        classifier: Classifier,
        dispatcher: Dispatcher,
        executor: ResilientExecutor,
        page_size: u32,
        max_replies_per_cycle: usize,
    ) -> Self {
        Self {
            feed,
            store,
            classifier,
            dispatcher,
            executor,
            page_size,
            max_replies_per_cycle,
            state: LoopState::Sleeping,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    fn transition(&mut self, next: LoopState) {
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Run cycles until `shutdown` is cancelled or a cycle fails.
    ///
    /// Settings are persisted on the way out either way; a persistence
    /// failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns the [`BotError`] that ended the loop.
    pub async fn run(
        &mut self,
        ctx: &mut BotContext,
        shutdown: CancellationToken,
    ) -> Result<(), BotError> {
        info!(
            "Poll loop started (interval: {}s, max replies per cycle: {})",
            ctx.settings.effective_polling_interval().as_secs(),
            ctx.settings.reply_budget(self.max_replies_per_cycle)
        );

        let result = loop {
            if shutdown.is_cancelled() {
                info!("Stop requested.");
                break Ok(());
            }

            match self.run_cycle(ctx).await {
                Ok(report) => log_cycle(&report),
                Err(e) => {
                    error!("Critical failure: {e}");
                    break Err(e);
                }
            }

            self.transition(LoopState::Sleeping);
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Stop requested.");
                    break Ok(());
                }
                () = tokio::time::sleep(ctx.settings.effective_polling_interval()) => {}
            }
        };

        self.transition(LoopState::ShuttingDown);
        info!("Bot shutting down. Saving state...");
        save_best_effort(self.store.as_ref(), &ctx.settings).await;
        result
    }

    /// Run a single fetch, classify and dispatch cycle.
    ///
    /// # Errors
    ///
    /// Returns `BotError::ChatEnded` when the feed reports the chat is over.
    pub async fn run_cycle(&mut self, ctx: &mut BotContext) -> Result<CycleReport, BotError> {
        let mut report = CycleReport::default();

        self.transition(LoopState::Fetching);
        let messages = self.fetch().await?;
        report.fetched = messages.len();

        self.transition(LoopState::Classifying);
        for message in messages {
            if !ctx.ledger.first_sighting(&message.id) {
                report.duplicates += 1;
                continue;
            }
            let outcome = self.classifier.classify(
                message,
                &ctx.settings,
                &mut ctx.authors,
                &mut ctx.queue,
            );
            if outcome.welcomed() {
                report.welcomed += 1;
            }
            match outcome {
                Classification::Blacklisted | Classification::OwnMessage => report.dropped += 1,
                Classification::Queued { .. } => report.queued += 1,
                Classification::Filtered { .. } => report.filtered += 1,
            }
        }

        self.transition(LoopState::Dispatching);
        let budget = ctx.settings.reply_budget(self.max_replies_per_cycle);
        report.dispatch = self
            .dispatcher
            .dispatch(self.feed.as_ref(), &mut ctx.queue, &ctx.settings, budget)
            .await;

        Ok(report)
    }

    /// Fetch through the executor; only an ended chat is escalated.
    async fn fetch(&self) -> Result<Vec<ChatMessage>, BotError> {
        let feed = self.feed.as_ref();
        let page_size = self.page_size;
        match self
            .executor
            .execute("list_new_messages", || feed.list_new_messages(page_size))
            .await
        {
            Ok(messages) => Ok(messages),
            Err(CallError::Fatal(FeedError::ChatEnded(reason))) => Err(BotError::ChatEnded(reason)),
            Err(CallError::QuotaExhausted(_)) => {
                warn!("Skipping fetch this cycle: quota exhausted. Consider raising polling_interval.");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!("Skipping fetch this cycle: {e}");
                Ok(Vec::new())
            }
        }
    }
}

fn log_cycle(report: &CycleReport) {
    info!(
        fetched = report.fetched,
        duplicates = report.duplicates,
        dropped = report.dropped,
        queued = report.queued,
        filtered = report.filtered,
        welcomed = report.welcomed,
        sent = report.dispatch.sent,
        failed = report.dispatch.failed,
        requeued = report.dispatch.requeued,
        "Cycle complete"
    );
}
