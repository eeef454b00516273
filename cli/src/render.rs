//! Plain-text rendering of session state for the terminal.
//!
//! Everything that originated on the server passes through
//! [`sanitize_terminal_text`] before it is returned.

use scribe_engine::{
    ConversationStats, RateLimitStatus, RateLimits, Refinement, Section, Suggestion,
};
use scribe_utils::sanitize_terminal_text;

#[must_use]
pub fn welcome(section: Section) -> String {
    format!(
        "Assisted mode for {}. Describe what you want and the assistant will draft it.\n\
         Suggestions can be accepted (/accept), rejected (/reject) or refined (/refine).",
        section.display_name()
    )
}

#[must_use]
pub fn suggestion(suggestion: &Suggestion) -> String {
    let clean = |s: &str| sanitize_terminal_text(s).into_owned();
    let mut out = String::from("--- Suggestion ---\n");
    match suggestion {
        Suggestion::Project(project) => {
            out.push_str(&format!("{}\n", clean(&project.title)));
            out.push_str(&format!("Technologies: {}\n", clean(&project.technologies)));
            if let Some(link) = &project.link {
                out.push_str(&format!("Link: {}\n", clean(link)));
            }
            for line in &project.description {
                out.push_str(&format!("  - {}\n", clean(line)));
            }
        }
        Suggestion::Summary(summary) => {
            out.push_str(&clean(&summary.summary));
            out.push('\n');
        }
        Suggestion::Skills(skills) => {
            for category in &skills.skills {
                out.push_str(&format!(
                    "{}: {}\n",
                    clean(&category.name),
                    clean(&category.value)
                ));
            }
        }
        Suggestion::Experience(exp) => {
            out.push_str(&format!("{} at {}\n", clean(&exp.position), clean(&exp.company)));
            let dates = [exp.start_date.as_str(), exp.end_date.as_str()]
                .iter()
                .filter(|d| !d.is_empty())
                .map(|d| clean(d))
                .collect::<Vec<_>>()
                .join(" - ");
            let details = [clean(&exp.location), dates]
                .into_iter()
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
                .join(" | ");
            if !details.is_empty() {
                out.push_str(&details);
                out.push('\n');
            }
            for achievement in &exp.achievements {
                out.push_str(&format!("  - {}\n", clean(achievement)));
            }
        }
    }
    out.push_str("------------------");
    out
}

#[must_use]
pub fn refinement_menu(section: Section, refinements: &[Refinement]) -> String {
    if refinements.is_empty() {
        return format!("No refinements available for {}.", section.display_name());
    }
    refinements
        .iter()
        .map(|r| format!("  {:<16} {}", r.id, r.label))
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn stats(stats: &ConversationStats) -> String {
    format!(
        "Messages: {} ({} user, {} assistant)\nCharacters: {}\nEstimated tokens: {}",
        stats.total_messages,
        stats.user_messages,
        stats.assistant_messages,
        stats.total_characters,
        stats.estimated_tokens
    )
}

#[must_use]
pub fn limits(limits: RateLimits, status: RateLimitStatus) -> String {
    let base = format!(
        "Remaining requests: {} for this section, {} for this session",
        limits.remaining_section, limits.remaining_session
    );
    match status {
        RateLimitStatus::Available => base,
        RateLimitStatus::Low { remaining } => {
            format!("{base}\nOnly {remaining} section request(s) left.")
        }
        RateLimitStatus::Exhausted => {
            format!("{base}\nSection limit reached. Use /reset-limits to continue.")
        }
    }
}
