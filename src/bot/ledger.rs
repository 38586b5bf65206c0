//! Message and author identity tracking
//!
//! Both sets grow for the lifetime of the process. Identifiers are unique and
//! the feed only moves forward, so nothing is ever evicted.

use std::collections::HashSet;
use tracing::debug;

/// Message identifiers that have already been handled
#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the message was already handled
    #[must_use]
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record the message as handled. Marking twice is a no-op.
    pub fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_string());
        }
    }

    /// Check and mark in one step.
    ///
    /// Returns `true` if the identifier is new and has now been recorded.
    pub fn first_sighting(&mut self, id: &str) -> bool {
        if self.has_seen(id) {
            debug!("Skipping duplicate message {id}");
            return false;
        }
        self.mark_seen(id);
        true
    }

    /// Number of recorded identifiers
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Authors who have already been greeted (or considered for a greeting)
#[derive(Debug, Default, Clone)]
pub struct SeenAuthors {
    authors: HashSet<String>,
}

impl SeenAuthors {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the author; returns `true` only the first time
    pub fn insert(&mut self, author_id: &str) -> bool {
        if self.authors.contains(author_id) {
            return false;
        }
        self.authors.insert(author_id.to_string())
    }

    /// Whether the author was recorded before
    #[must_use]
    pub fn contains(&self, author_id: &str) -> bool {
        self.authors.contains(author_id)
    }

    /// Number of distinct authors
    #[must_use]
    pub fn len(&self) -> usize {
        self.authors.len()
    }

    /// Whether no author was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }
}
