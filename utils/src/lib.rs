//! Shared infrastructure utilities for Scribe.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename) for the key-value store
//! - **`display`**: Terminal sanitization for server-provided text

pub mod atomic_write;
pub mod display;

pub use atomic_write::{atomic_write, recover_bak_file};
pub use display::sanitize_terminal_text;
