//! Chat message domain model.
//!
//! Constructors take the timestamp explicitly; callers own the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Whether messages with this role are replayed to the assistant endpoint.
    #[must_use]
    pub const fn is_conversational(self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

/// One entry in a section conversation.
///
/// Persisted and exported as `{id, role, content, timestamp, isSuggestion?}` with
/// an ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_suggestion: bool,
}

impl Message {
    #[must_use]
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp,
            is_suggestion: false,
        }
    }

    #[must_use]
    pub fn user(id: MessageId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, Role::User, content, timestamp)
    }

    #[must_use]
    pub fn assistant(id: MessageId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, Role::Assistant, content, timestamp)
    }

    /// Narrative text that arrived with a structured suggestion.
    #[must_use]
    pub fn suggestion_note(
        id: MessageId,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            is_suggestion: true,
            ..Self::new(id, Role::Assistant, content, timestamp)
        }
    }

    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn is_suggestion(&self) -> bool {
        self.is_suggestion
    }

    /// Extend the content of a message that is still streaming.
    pub fn push_content(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }
}
