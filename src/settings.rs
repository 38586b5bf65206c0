//! Runtime settings record and its durable store
//!
//! Settings are read once at startup (defaults substituted on any failure)
//! and written back at shutdown. Failures on either side are logged only.

use crate::config::MIN_POLLING_INTERVAL_SECS;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Errors that can occur while reading or writing settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which ordinary chat messages get a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Reply to every message
    #[default]
    All,
    /// Reply only when the bot's name appears in the message
    #[serde(alias = "mentions-only", alias = "mentions_only")]
    Mentions,
    /// Reply only to VIP authors
    #[serde(alias = "vip-only", alias = "vip_only")]
    Vip,
}

/// Runtime settings shared with the administration surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between fetch cycles
    pub polling_interval: i64,
    /// Minimum seconds between replies (advisory)
    pub cooldown: u64,
    /// Reply filter for ordinary messages
    pub response_mode: ResponseMode,
    /// Send a one-time welcome to first-time authors
    pub auto_greet: bool,
    /// Tone/language tag passed to the generator
    pub language: String,
    /// Allow light humor in generated replies
    pub jokes: bool,
    /// Authors whose messages go to the priority lane
    pub vip_users: HashSet<String>,
    /// Authors whose messages are dropped
    pub blacklisted_users: HashSet<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            polling_interval: 5,
            cooldown: 2,
            response_mode: ResponseMode::All,
            auto_greet: true,
            language: "hinglish".to_string(),
            jokes: true,
            vip_users: HashSet::new(),
            blacklisted_users: HashSet::new(),
        }
    }
}

impl Settings {
    /// Sleep between cycles, never shorter than one second.
    #[must_use]
    pub fn effective_polling_interval(&self) -> Duration {
        let secs = u64::try_from(self.polling_interval)
            .unwrap_or(0)
            .max(MIN_POLLING_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    /// Replies allowed in one cycle.
    ///
    /// With a cooldown set, a cycle of `polling_interval` seconds fits at most
    /// `polling_interval / cooldown` replies (at least one).
    #[must_use]
    pub fn reply_budget(&self, max_per_cycle: usize) -> usize {
        if self.cooldown == 0 {
            return max_per_cycle;
        }
        let interval = self.effective_polling_interval().as_secs();
        let by_cooldown = usize::try_from(interval / self.cooldown)
            .unwrap_or(usize::MAX)
            .max(1);
        max_per_cycle.min(by_cooldown)
    }

    /// Whether the author is on the VIP list
    #[must_use]
    pub fn is_vip(&self, author_id: &str) -> bool {
        self.vip_users.contains(author_id)
    }

    /// Whether the author is blacklisted
    #[must_use]
    pub fn is_blacklisted(&self, author_id: &str) -> bool {
        self.blacklisted_users.contains(author_id)
    }
}

/// Durable storage for [`Settings`]
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the stored settings
    async fn load(&self) -> Result<Settings, SettingsError>;
    /// Persist the given settings
    async fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Load settings, substituting defaults on any failure.
pub async fn load_or_default(store: &dyn SettingsStore) -> Settings {
    match store.load().await {
        Ok(settings) => {
            info!("Settings loaded.");
            settings
        }
        Err(e) => {
            error!("Error loading settings: {e}. Using defaults.");
            Settings::default()
        }
    }
}

/// Persist settings; a failure is logged and swallowed.
pub async fn save_best_effort(store: &dyn SettingsStore, settings: &Settings) {
    match store.save(settings).await {
        Ok(()) => info!("Settings saved."),
        Err(e) => error!("Error saving settings: {e}"),
    }
}

/// Settings kept as a JSON file on local disk
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Create a store backed by the file at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<Settings, SettingsError> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let raw = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}
