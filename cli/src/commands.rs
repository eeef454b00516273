//! Slash commands accepted at the prompt.

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub label: &'static str,
    pub description: &'static str,
}

const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        label: "mode",
        description: "Toggle manual/assisted mode",
    },
    CommandSpec {
        label: "ai",
        description: "Switch to assisted mode",
    },
    CommandSpec {
        label: "manual",
        description: "Switch to manual mode",
    },
    CommandSpec {
        label: "accept",
        description: "Accept the current suggestion",
    },
    CommandSpec {
        label: "reject",
        description: "Discard the current suggestion",
    },
    CommandSpec {
        label: "refine [kind]",
        description: "Ask for a refined suggestion (lists kinds without an argument)",
    },
    CommandSpec {
        label: "cancel",
        description: "Stop the response in progress",
    },
    CommandSpec {
        label: "clear",
        description: "Clear the conversation and its saved history",
    },
    CommandSpec {
        label: "export",
        description: "Write the conversation to a JSON file",
    },
    CommandSpec {
        label: "stats",
        description: "Show conversation statistics",
    },
    CommandSpec {
        label: "limits",
        description: "Show remaining requests",
    },
    CommandSpec {
        label: "reset-limits",
        description: "Reset this session's request limits",
    },
    CommandSpec {
        label: "q, quit",
        description: "Exit",
    },
];

#[must_use]
pub fn command_help() -> String {
    let width = COMMAND_SPECS
        .iter()
        .map(|spec| spec.label.len())
        .max()
        .unwrap_or(0);
    COMMAND_SPECS
        .iter()
        .map(|spec| format!("  /{:<width$}  {}", spec.label, spec.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Message(&'a str),
    Command(Command<'a>),
    Empty,
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Input::Empty;
        }
        match trimmed.strip_prefix('/') {
            Some(raw) => Input::Command(Command::parse(raw)),
            None => Input::Message(trimmed),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    ToggleMode,
    Ai,
    Manual,
    Accept,
    Reject,
    Refine(Option<&'a str>),
    Cancel,
    Clear,
    Export,
    Stats,
    Limits,
    ResetLimits,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let parts: Vec<&str> = raw.split_whitespace().collect();

        match parts.first().copied() {
            Some("mode") => Command::ToggleMode,
            Some("ai") => Command::Ai,
            Some("manual") => Command::Manual,
            Some("accept") => Command::Accept,
            Some("reject") => Command::Reject,
            Some("refine") => Command::Refine(parts.get(1).copied()),
            Some("cancel") => Command::Cancel,
            Some("clear") => Command::Clear,
            Some("export") => Command::Export,
            Some("stats") => Command::Stats,
            Some("limits") => Command::Limits,
            Some("reset-limits") => Command::ResetLimits,
            Some("help") => Command::Help,
            Some("q" | "quit") => Command::Quit,
            Some(cmd) => Command::Unknown(cmd),
            None => Command::Empty,
        }
    }
}
