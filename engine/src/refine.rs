//! Quick refinement prompts offered while a suggestion is on screen.

use scribe_types::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

const QUANTIFY: Refinement = Refinement {
    id: "quantify",
    label: "Add Metrics",
    prompt: "Can you add more quantifiable metrics and numbers to show the impact?",
};
const TECHNICAL: Refinement = Refinement {
    id: "technical",
    label: "More Technical",
    prompt: "Can you add more technical depth and implementation details?",
};
const SIMPLIFY: Refinement = Refinement {
    id: "simplify",
    label: "Simplify",
    prompt: "Can you simplify this to be more concise and accessible?",
};
const EXPAND: Refinement = Refinement {
    id: "expand",
    label: "Expand",
    prompt: "Can you expand each point with more context and detail?",
};

const PROJECTS: &[Refinement] = &[QUANTIFY, TECHNICAL, SIMPLIFY, EXPAND];
const EXPERIENCE: &[Refinement] = &[QUANTIFY, TECHNICAL, SIMPLIFY];
const SUMMARY: &[Refinement] = &[
    Refinement {
        id: "impactful",
        label: "More Impactful",
        prompt: "Can you make this summary more impactful with stronger achievements?",
    },
    Refinement {
        id: "keywords",
        label: "Add Keywords",
        prompt: "Can you add more relevant technical keywords to this summary?",
    },
    Refinement {
        id: "simplify",
        label: "Simplify",
        prompt: "Can you simplify this summary while keeping the impact?",
    },
];
const SKILLS: &[Refinement] = &[
    Refinement {
        id: "add_categories",
        label: "Add Categories",
        prompt: "Can you suggest additional skill categories that might be relevant?",
    },
    Refinement {
        id: "match_jd",
        label: "Match Job",
        prompt: "Can you re-prioritize these skills to better match the job description?",
    },
    Refinement {
        id: "prioritize",
        label: "Prioritize",
        prompt: "Can you reorganize these skills putting the most important ones first?",
    },
];

/// Refinements offered for `section`, in display order.
#[must_use]
pub fn refinements(section: Section) -> &'static [Refinement] {
    match section {
        Section::Projects => PROJECTS,
        Section::Experience => EXPERIENCE,
        Section::Summary => SUMMARY,
        Section::Skills => SKILLS,
        Section::Education => &[],
    }
}

#[must_use]
pub fn default_refinement(section: Section) -> Option<&'static Refinement> {
    let id = match section {
        Section::Projects | Section::Experience => "quantify",
        Section::Summary => "impactful",
        Section::Skills => "prioritize",
        Section::Education => return None,
    };
    refinements(section).iter().find(|r| r.id == id)
}

/// Look up `id`, falling back to the section default for unknown ids.
#[must_use]
pub fn resolve_refinement(section: Section, id: &str) -> Option<&'static Refinement> {
    refinements(section)
        .iter()
        .find(|r| r.id == id)
        .or_else(|| default_refinement(section))
}
