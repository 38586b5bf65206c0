/// Classification of incoming messages into queue lanes
pub mod classifier;
/// Reply composition and posting
pub mod dispatcher;
/// Message dedup and first-seen author tracking
pub mod ledger;
/// Fetch, classify, dispatch, sleep
pub mod poll_loop;
/// Two-lane reply queue
pub mod queue;
/// Retry with exponential backoff for remote calls
pub mod resilient;

pub use classifier::{Classification, Classifier};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use ledger::{DedupLedger, SeenAuthors};
pub use poll_loop::{BotContext, BotError, CycleReport, LoopState, PollLoop};
pub use queue::{DualQueue, Lane, PendingReply};
pub use resilient::{CallError, Classify, FailureClass, ResilientExecutor, RetryPolicy};
