#![deny(missing_docs)]
//! Live chat responder library.
//!
//! Polls a live chat feed, decides which messages deserve a reply, and sends
//! rate-limited replies back through the same feed.

/// Chat engine: dedup, classification, queueing, retries, dispatch and the poll loop.
pub mod bot;
/// Process configuration and constants.
pub mod config;
/// Live chat feed abstraction and the YouTube implementation.
pub mod feed;
/// Reply generation.
pub mod llm;
/// Runtime settings record and its store.
pub mod settings;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
