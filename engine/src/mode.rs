//! Per-section manual/assisted mode with a one-shot welcome flag.
//!
//! Stored under `ai_mode_{section}` as the literal string `manual` or `ai`.
//! Anything else found there (or a failing store) reads as "no preference".

use scribe_types::{AssistMode, Section};

use crate::storage::KeyValueStore;

pub const MODE_KEY_PREFIX: &str = "ai_mode_";

#[must_use]
pub fn mode_storage_key(section: Section) -> String {
    format!("{MODE_KEY_PREFIX}{}", section.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeController {
    section: Section,
    mode: AssistMode,
    show_welcome: bool,
}

impl ModeController {
    /// Restore the persisted mode, defaulting to [`AssistMode::Manual`].
    #[must_use]
    pub fn load(section: Section, store: &dyn KeyValueStore) -> Self {
        let key = mode_storage_key(section);
        let mode = match store.get(&key) {
            Ok(Some(raw)) => AssistMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(key = %key, value = %raw, "Ignoring unrecognized mode preference");
                AssistMode::default()
            }),
            Ok(None) => AssistMode::default(),
            Err(e) => {
                tracing::warn!(key = %key, "Failed to read mode preference: {e}");
                AssistMode::default()
            }
        };

        Self {
            section,
            mode,
            show_welcome: false,
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn mode(&self) -> AssistMode {
        self.mode
    }

    #[must_use]
    pub fn is_ai(&self) -> bool {
        self.mode == AssistMode::Ai
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.mode == AssistMode::Manual
    }

    #[must_use]
    pub fn show_welcome(&self) -> bool {
        self.show_welcome
    }

    pub fn toggle(&mut self, store: &mut dyn KeyValueStore) -> AssistMode {
        let next = self.mode.flipped();
        self.set_mode(next, store);
        next
    }

    /// Entering `ai` raises the welcome flag, even when already in `ai`.
    pub fn set_mode(&mut self, mode: AssistMode, store: &mut dyn KeyValueStore) {
        self.mode = mode;
        if mode == AssistMode::Ai {
            self.show_welcome = true;
        }
        self.persist(store);
    }

    pub fn dismiss_welcome(&mut self) {
        self.show_welcome = false;
    }

    fn persist(&self, store: &mut dyn KeyValueStore) {
        let key = mode_storage_key(self.section);
        if let Err(e) = store.set(&key, self.mode.as_str()) {
            tracing::warn!(key = %key, "Failed to save mode preference: {e}");
        }
    }
}
