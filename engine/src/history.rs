//! Per-section conversation history in the key-value store.
//!
//! Records live under `ai_conversation_{section}` as a JSON array of messages
//! with ISO-8601 timestamps. Persistence is only active while the section is in
//! assisted mode. Write failures never reach the session: on a quota error we
//! evict half of the other sections' records, retry with a shorter tail, and
//! otherwise log and move on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scribe_types::{AssistMode, Message, Role, Section};
use scribe_utils::atomic_write;

use crate::storage::{KeyValueStore, StoreError};

pub const HISTORY_KEY_PREFIX: &str = "ai_conversation_";

pub const DEFAULT_MAX_MESSAGES: usize = 50;
pub const DEFAULT_RETAINED_ON_QUOTA: usize = 20;

/// Rough characters-per-token ratio used for the stats estimate.
const CHARS_PER_TOKEN: usize = 4;

#[must_use]
pub fn history_storage_key(section: Section) -> String {
    format!("{HISTORY_KEY_PREFIX}{}", section.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    /// Newest messages written on every save.
    pub max_messages: usize,
    /// Newest messages kept on the retry after a quota eviction.
    pub retained_on_quota: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            retained_on_quota: DEFAULT_RETAINED_ON_QUOTA,
        }
    }
}

/// What a [`HistoryPersistence::save`] call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Persistence is off for this section.
    Disabled,
    Saved { messages: usize },
    /// First write hit the quota; `evicted` other records were removed and the
    /// shorter retry succeeded.
    SavedAfterEviction { evicted: usize, messages: usize },
    /// The write failed and the history was not persisted.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl ConversationStats {
    #[must_use]
    pub fn of(messages: &[Message]) -> Self {
        let count = |role: Role| messages.iter().filter(|m| m.role() == role).count();
        let total_characters = messages.iter().map(|m| m.content().chars().count()).sum();
        Self {
            total_messages: messages.len(),
            user_messages: count(Role::User),
            assistant_messages: count(Role::Assistant),
            total_characters,
            estimated_tokens: total_characters.div_ceil(CHARS_PER_TOKEN),
        }
    }
}

/// Mirror of one section's messages in the store.
#[derive(Debug, Clone)]
pub struct HistoryPersistence {
    section: Section,
    key: String,
    enabled: bool,
    settings: HistorySettings,
}

impl HistoryPersistence {
    #[must_use]
    pub fn new(section: Section, settings: HistorySettings) -> Self {
        Self {
            section,
            key: history_storage_key(section),
            enabled: true,
            settings,
        }
    }

    /// Enabled exactly when the section is in assisted mode.
    #[must_use]
    pub fn for_mode(section: Section, mode: AssistMode, settings: HistorySettings) -> Self {
        let mut history = Self::new(section, settings);
        history.set_mode(mode);
        history
    }

    pub fn set_mode(&mut self, mode: AssistMode) {
        self.enabled = mode == AssistMode::Ai;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn settings(&self) -> HistorySettings {
        self.settings
    }

    /// Restore the persisted record. Disabled, absent, or corrupt reads as empty.
    #[must_use]
    pub fn load(&self, store: &dyn KeyValueStore) -> Vec<Message> {
        if !self.enabled {
            return Vec::new();
        }
        match store.get(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(key = %self.key, "Ignoring corrupt conversation history: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to read conversation history: {e}");
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn has_history(&self, store: &dyn KeyValueStore) -> bool {
        !self.load(store).is_empty()
    }

    /// Write the newest messages, evicting other sections under quota pressure.
    pub fn save(&self, store: &mut dyn KeyValueStore, messages: &[Message]) -> SaveOutcome {
        if !self.enabled {
            return SaveOutcome::Disabled;
        }

        let tail = newest(messages, self.settings.max_messages);
        let err = match self.write(store, tail) {
            Ok(()) => return SaveOutcome::Saved { messages: tail.len() },
            Err(err) => err,
        };

        if !err.is_quota_exceeded() {
            tracing::warn!(key = %self.key, "Failed to save conversation history: {err}");
            return SaveOutcome::Dropped;
        }

        tracing::warn!(key = %self.key, "Conversation history over quota, evicting other sections");
        let evicted = self.evict_other_sections(store);
        let retry = newest(messages, self.settings.retained_on_quota);
        match self.write(store, retry) {
            Ok(()) => SaveOutcome::SavedAfterEviction {
                evicted,
                messages: retry.len(),
            },
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to save conversation history after eviction: {e}");
                SaveOutcome::Dropped
            }
        }
    }

    pub fn clear(&self, store: &mut dyn KeyValueStore) {
        if let Err(e) = store.remove(&self.key) {
            tracing::warn!(key = %self.key, "Failed to clear conversation history: {e}");
        }
    }

    fn write(&self, store: &mut dyn KeyValueStore, messages: &[Message]) -> Result<(), StoreError> {
        let json = serde_json::to_string(messages)?;
        store.set(&self.key, &json)
    }

    /// Remove the first half (by key order) of other sections' records.
    fn evict_other_sections(&self, store: &mut dyn KeyValueStore) -> usize {
        let keys = match store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list storage keys for eviction: {e}");
                return 0;
            }
        };

        let mut others: Vec<String> = keys
            .into_iter()
            .filter(|key| key.starts_with(HISTORY_KEY_PREFIX) && *key != self.key)
            .collect();
        others.sort();

        let mut evicted = 0;
        for key in others.iter().take(others.len() / 2) {
            match store.remove(key) {
                Ok(()) => {
                    tracing::debug!(key = %key, "Evicted conversation history");
                    evicted += 1;
                }
                Err(e) => tracing::warn!(key = %key, "Failed to evict conversation history: {e}"),
            }
        }
        evicted
    }
}

fn newest(messages: &[Message], limit: usize) -> &[Message] {
    &messages[messages.len().saturating_sub(limit)..]
}

// ============================================================================
// Export
// ============================================================================

/// A conversation serialized for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationExport {
    pub file_name: String,
    pub contents: String,
}

impl ConversationExport {
    /// Serialize the in-memory messages as pretty JSON named
    /// `conversation_{section}_{epoch-ms}.json`.
    pub fn new(
        section: Section,
        messages: &[Message],
        now: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            file_name: format!(
                "conversation_{}_{}.json",
                section.as_str(),
                now.timestamp_millis()
            ),
            contents: serde_json::to_string_pretty(messages)?,
        })
    }

    /// Write into `dir`, returning the full path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        atomic_write(&path, self.contents.as_bytes())?;
        Ok(path)
    }
}

/// Re-load an exported (or persisted) message array.
pub fn parse_export(contents: &str) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_str(contents)
}
