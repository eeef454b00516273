//! Core engine for Scribe: the streaming assistant session and the state that
//! lives around it.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`session`] | One section's conversation: sends turns, applies stream events, cancellation |
//! | [`suggestion`] | Narrowing raw payloads to typed suggestions, re-delivery ids |
//! | [`rate_limit`] | Remaining-request counters and the advisory input gate |
//! | [`mode`] | Manual/assisted mode per section, persisted |
//! | [`history`] | Per-section conversation persistence, stats, export |
//! | [`refine`] | Quick refinement prompts |
//! | [`storage`] | `KeyValueStore` seam with memory and file backends |
//! | [`config`] | `~/.scribe/config.toml` |

pub mod config;
pub mod history;
pub mod mode;
pub mod rate_limit;
pub mod refine;
pub mod session;
pub mod storage;
pub mod suggestion;

pub use config::{ConfigError, ScribeConfig, config_path, scribe_dir};
pub use history::{
    ConversationExport, ConversationStats, HistoryPersistence, HistorySettings, SaveOutcome,
    parse_export,
};
pub use mode::ModeController;
pub use rate_limit::{RateLimitStatus, RateLimitTracker};
pub use refine::{Refinement, default_refinement, refinements, resolve_refinement};
pub use session::{AssistSession, SessionState, SessionUpdate};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use suggestion::{SuggestionId, materialize};

pub use scribe_client::{self, AssistClient, ClientError};
pub use scribe_types::{
    AssistMode, Message, RateLimits, ResumeContext, Role, Section, Suggestion,
};
