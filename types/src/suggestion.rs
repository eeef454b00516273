//! Section-typed suggestion shapes.
//!
//! A [`Suggestion`] is only ever built by the engine's materializer, which is the
//! single narrowing boundary from the loosely-typed wire payload.

use serde::{Deserialize, Serialize};

use crate::Section;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSuggestion {
    pub title: String,
    pub technologies: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySuggestion {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCategory {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsSuggestion {
    pub skills: Vec<SkillCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceSuggestion {
    pub position: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub achievements: Vec<String>,
}

/// A structured content proposal awaiting accept/reject/refine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Suggestion {
    Project(ProjectSuggestion),
    Summary(SummarySuggestion),
    Skills(SkillsSuggestion),
    Experience(ExperienceSuggestion),
}

impl Suggestion {
    /// The section whose shape this suggestion has.
    #[must_use]
    pub const fn section(&self) -> Section {
        match self {
            Suggestion::Project(_) => Section::Projects,
            Suggestion::Summary(_) => Section::Summary,
            Suggestion::Skills(_) => Section::Skills,
            Suggestion::Experience(_) => Section::Experience,
        }
    }

    #[must_use]
    pub fn as_project(&self) -> Option<&ProjectSuggestion> {
        match self {
            Suggestion::Project(project) => Some(project),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_summary(&self) -> Option<&SummarySuggestion> {
        match self {
            Suggestion::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_skills(&self) -> Option<&SkillsSuggestion> {
        match self {
            Suggestion::Skills(skills) => Some(skills),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_experience(&self) -> Option<&ExperienceSuggestion> {
        match self {
            Suggestion::Experience(experience) => Some(experience),
            _ => None,
        }
    }
}
