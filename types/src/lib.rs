//! Core domain types for Scribe.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ids;
mod message;
mod suggestion;

pub use ids::{MessageId, MessageIdGenerator};
pub use message::{Message, Role};
pub use suggestion::{
    ExperienceSuggestion, ProjectSuggestion, SkillCategory, SkillsSuggestion, Suggestion,
    SummarySuggestion,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("message content must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// Section
// ============================================================================

/// One resume category. Scopes a conversation, its suggestions, and its
/// persisted history independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Projects,
    Experience,
    Education,
    Summary,
    Skills,
}

#[derive(Debug, Error)]
#[error("unknown resume section: {0}")]
pub struct SectionParseError(String);

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Projects,
        Section::Experience,
        Section::Education,
        Section::Summary,
        Section::Skills,
    ];

    /// Path segment and storage-key suffix for this section.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Section::Projects => "projects",
            Section::Experience => "experience",
            Section::Education => "education",
            Section::Summary => "summary",
            Section::Skills => "skills",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Section::Projects => "Projects",
            Section::Experience => "Experience",
            Section::Education => "Education",
            Section::Summary => "Summary",
            Section::Skills => "Skills",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = SectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == normalized)
            .ok_or(SectionParseError(normalized))
    }
}

// ============================================================================
// Assist Mode
// ============================================================================

/// Whether a section is edited by hand or through the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistMode {
    #[default]
    Manual,
    Ai,
}

impl AssistMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AssistMode::Manual => "manual",
            AssistMode::Ai => "ai",
        }
    }

    /// Parse a persisted value. Anything other than the two canonical spellings is absent.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(AssistMode::Manual),
            "ai" => Some(AssistMode::Ai),
            _ => None,
        }
    }

    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            AssistMode::Manual => AssistMode::Ai,
            AssistMode::Ai => AssistMode::Manual,
        }
    }
}

// ============================================================================
// Rate Limits
// ============================================================================

/// Remaining-request counters reported by the server.
///
/// Both fields always move together; a telemetry event overwrites the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub remaining_section: u32,
    pub remaining_session: u32,
}

impl RateLimits {
    pub const DEFAULT_SECTION: u32 = 15;
    pub const DEFAULT_SESSION: u32 = 50;

    #[must_use]
    pub const fn new(remaining_section: u32, remaining_session: u32) -> Self {
        Self {
            remaining_section,
            remaining_session,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SECTION, Self::DEFAULT_SESSION)
    }
}

// ============================================================================
// Resume Context
// ============================================================================

/// Section-scoped snapshot of the resume sent alongside each request.
///
/// Existing entries are opaque to the core; they are forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeContext {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub existing_projects: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub existing_experience: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub existing_education: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub existing_skills: Option<Vec<SkillCategory>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_summary: Option<String>,
}

impl ResumeContext {
    #[must_use]
    pub fn with_target_job(mut self, target_job: impl Into<String>) -> Self {
        self.target_job = Some(target_job.into());
        self
    }

    /// Fold an accepted suggestion into the snapshot sent with later turns.
    pub fn record_accepted(&mut self, accepted: &Suggestion) {
        match accepted {
            Suggestion::Project(project) => {
                if let Ok(entry) = serde_json::to_value(project) {
                    self.existing_projects.get_or_insert_with(Vec::new).push(entry);
                }
            }
            Suggestion::Experience(experience) => {
                if let Ok(entry) = serde_json::to_value(experience) {
                    self.existing_experience
                        .get_or_insert_with(Vec::new)
                        .push(entry);
                }
            }
            Suggestion::Summary(summary) => {
                self.current_summary = Some(summary.summary.clone());
            }
            Suggestion::Skills(skills) => {
                self.existing_skills = Some(skills.skills.clone());
            }
        }
    }
}
