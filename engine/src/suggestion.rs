//! Suggestion materialization and re-delivery detection.
//!
//! [`materialize`] is the single place where a loosely-typed suggestion payload
//! is narrowed to the section's typed shape. A payload that does not carry the
//! section's field yields `None`; nothing partial is ever produced.

use std::fmt::{self, Write as _};

use scribe_types::{
    ExperienceSuggestion, ProjectSuggestion, Section, SkillCategory, SkillsSuggestion, Suggestion,
    SummarySuggestion,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Optional narration that accompanies a suggestion payload.
#[must_use]
pub fn suggestion_message(payload: &Value) -> Option<&str> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .filter(|msg| !msg.trim().is_empty())
}

/// Map a raw payload to the typed suggestion for `section`.
///
/// | Section | Source field |
/// |---------|--------------|
/// | projects | `projects[0]` |
/// | summary | `summary` |
/// | skills | `skills` |
/// | experience | `experiences[0]` |
/// | education | never materialized |
#[must_use]
pub fn materialize(section: Section, payload: &Value) -> Option<Suggestion> {
    let suggestion = match section {
        Section::Projects => {
            let first = payload.get("projects")?.as_array()?.first()?;
            Suggestion::Project(decode::<ProjectSuggestion>(section, first)?)
        }
        Section::Summary => {
            let summary = payload
                .get("summary")?
                .as_str()
                .filter(|s| !s.is_empty())?;
            Suggestion::Summary(SummarySuggestion {
                summary: summary.to_string(),
            })
        }
        Section::Skills => {
            let skills = decode::<Vec<SkillCategory>>(section, payload.get("skills")?)?;
            Suggestion::Skills(SkillsSuggestion { skills })
        }
        Section::Experience => {
            let first = payload.get("experiences")?.as_array()?.first()?;
            Suggestion::Experience(decode::<ExperienceSuggestion>(section, first)?)
        }
        Section::Education => return None,
    };
    debug_assert_eq!(suggestion.section(), section);
    Some(suggestion)
}

fn decode<T: DeserializeOwned>(section: Section, value: &Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::debug!(section = %section, "Dropping suggestion with unexpected shape: {e}");
            None
        }
    }
}

/// Content-derived identity of one suggestion event.
///
/// Two deliveries of the same payload for the same section share an id, which
/// lets the session ignore re-delivery while a suggestion is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuggestionId(String);

impl SuggestionId {
    #[must_use]
    pub fn derive(section: Section, payload: &Value) -> Self {
        // serde_json maps serialize with sorted keys, so equal payloads hash equally.
        let input = format!("{}\n{}", section.as_str(), payload);

        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
