use std::fmt;

use chrono::{DateTime, Utc};

/// Identifier of a chat message.
///
/// Minted from wall-clock milliseconds, bumped when the clock does not advance,
/// so ids from one generator are unique and increase in mint order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MessageIdGenerator {
    last: i64,
}

impl MessageIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for an id minted elsewhere (restored history) so later ids
    /// never collide with it. Non-numeric ids are ignored.
    pub fn observe(&mut self, id: &MessageId) {
        if let Ok(value) = id.as_str().parse::<i64>() {
            self.last = self.last.max(value);
        }
    }

    pub fn mint(&mut self, now: DateTime<Utc>) -> MessageId {
        let millis = now.timestamp_millis();
        self.last = if millis > self.last {
            millis
        } else {
            self.last.saturating_add(1)
        };
        MessageId(self.last.to_string())
    }
}
