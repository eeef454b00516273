//! Terminal-safe rendering of server-provided text.
//!
//! Assistant replies and server error messages are untrusted. Before they reach
//! the terminal we drop ANSI escape sequences (CSI, OSC, DCS/PM/APC strings and
//! two-byte escapes) along with C0/C1 controls other than `\n`, `\t`, `\r`.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    /// Saw ESC, waiting for the introducer.
    Escape,
    /// ESC followed by a charset designator; swallow one more char.
    EscapeArg,
    /// Inside `ESC [` or C1 CSI: parameter/intermediate bytes until a final byte.
    Csi,
    /// Inside an OSC/DCS/PM/APC string: until BEL (OSC only) or ST.
    String { osc: bool },
    /// Saw ESC inside a string; `\` completes the ST terminator.
    StringEscape { osc: bool },
}

fn is_disallowed_control(c: char) -> bool {
    let c0 = c <= '\x1f' && !matches!(c, '\n' | '\t' | '\r');
    c0 || c == '\x7f' || ('\u{0080}'..='\u{009f}').contains(&c)
}

/// Strip escape sequences and control characters for display.
///
/// Returns `Cow::Borrowed` when the input is already clean.
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(|c| c == ESC || is_disallowed_control(c)) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut state = State::Text;

    for c in input.chars() {
        state = match state {
            State::Text => match c {
                ESC => State::Escape,
                C1_CSI => State::Csi,
                c if is_disallowed_control(c) => State::Text,
                c => {
                    out.push(c);
                    State::Text
                }
            },
            State::Escape => match c {
                '[' => State::Csi,
                ']' => State::String { osc: true },
                'P' | '^' | '_' => State::String { osc: false },
                '(' | ')' | '*' | '+' | '#' | ' ' => State::EscapeArg,
                '7' | '8' | 'c' | 'D' | 'E' | 'H' | 'M' | 'N' | 'O' | 'Z' | '=' | '>' | '<' => {
                    State::Text
                }
                ESC => State::Escape,
                c => {
                    // Unknown introducer: drop the ESC only.
                    if !is_disallowed_control(c) {
                        out.push(c);
                    }
                    State::Text
                }
            },
            State::EscapeArg => State::Text,
            State::Csi => match c {
                '\x20'..='\x3f' => State::Csi,
                '\x40'..='\x7e' => State::Text,
                ESC => State::Escape,
                c => {
                    if !is_disallowed_control(c) {
                        out.push(c);
                    }
                    State::Text
                }
            },
            State::String { osc } => match c {
                BEL if osc => State::Text,
                ESC => State::StringEscape { osc },
                _ => State::String { osc },
            },
            State::StringEscape { osc } => match c {
                '\\' => State::Text,
                ESC => State::StringEscape { osc },
                _ => State::String { osc },
            },
        };
    }

    Cow::Owned(out)
}
