//! Remaining-request counters and the input-gating policy derived from them.
//!
//! The tracker is passive: only server telemetry and explicit resets change it.
//! The policy is advisory. The session never refuses to send on its own; the
//! boundary (CLI, UI) reads [`RateLimitStatus`] and decides whether to accept input.

use scribe_types::RateLimits;

/// At or below this many section requests the boundary warns the user.
pub const LOW_REMAINING_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    Available,
    /// `1..=LOW_REMAINING_THRESHOLD` section requests left.
    Low { remaining: u32 },
    /// No section requests left; input should be disabled.
    Exhausted,
}

impl RateLimitStatus {
    #[must_use]
    pub fn of(limits: RateLimits) -> Self {
        match limits.remaining_section {
            0 => RateLimitStatus::Exhausted,
            n if n <= LOW_REMAINING_THRESHOLD => RateLimitStatus::Low { remaining: n },
            _ => RateLimitStatus::Available,
        }
    }

    #[must_use]
    pub fn is_exhausted(self) -> bool {
        matches!(self, RateLimitStatus::Exhausted)
    }

    #[must_use]
    pub fn is_low(self) -> bool {
        matches!(self, RateLimitStatus::Low { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitTracker {
    current: RateLimits,
    defaults: RateLimits,
}

impl RateLimitTracker {
    #[must_use]
    pub fn new(defaults: RateLimits) -> Self {
        Self {
            current: defaults,
            defaults,
        }
    }

    #[must_use]
    pub fn current(&self) -> RateLimits {
        self.current
    }

    #[must_use]
    pub fn defaults(&self) -> RateLimits {
        self.defaults
    }

    /// Apply one telemetry event. Both counters are replaced together.
    pub fn update(&mut self, limits: RateLimits) {
        self.current = limits;
    }

    pub fn reset(&mut self) {
        self.current = self.defaults;
    }

    #[must_use]
    pub fn status(&self) -> RateLimitStatus {
        RateLimitStatus::of(self.current)
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}
