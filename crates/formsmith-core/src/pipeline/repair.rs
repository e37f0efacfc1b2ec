//! Truncation and textual repair of candidate JSON.
//!
//! Two ordered passes run on a candidate that does not parse:
//!
//! 1. **Truncation**: if the candidate has unclosed containers or ends inside
//!    a string, cut it back to the last structurally safe position and append
//!    the missing closers.
//! 2. **Textual**: a fixed sequence of conservative rewrites (stray
//!    backslashes, missing commas, trailing commas, raw control characters).
//!
//! The result is parsed once more. There is no third pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use formsmith_types::error::GenerationError;

use super::extractor::ExtractedJson;
use super::scan::{open_containers, Balance, Container, ScanState, Scanner, Step};

/// Characters of the failing text kept in `RepairFailed` diagnostics.
pub const PREVIEW_CHARS: usize = 200;

/// A repair that was applied to reach valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    Truncation,
    StrayBackslash,
    MissingComma,
    TrailingComma,
    ControlInString,
    ControlOutsideString,
}

impl fmt::Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairKind::Truncation => "truncation",
            RepairKind::StrayBackslash => "stray_backslash",
            RepairKind::MissingComma => "missing_comma",
            RepairKind::TrailingComma => "trailing_comma",
            RepairKind::ControlInString => "control_in_string",
            RepairKind::ControlOutsideString => "control_outside_string",
        };
        write!(f, "{s}")
    }
}

/// Candidate that passed a JSON parse. Always syntactically valid.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedJson {
    text: String,
    value: Value,
    repairs: Vec<RepairKind>,
}

impl RepairedJson {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Repairs applied, in order. Empty when the candidate already parsed.
    pub fn repairs(&self) -> &[RepairKind] {
        &self.repairs
    }
}

type TextualPass = fn(&str) -> Option<String>;

const TEXTUAL_PASSES: [(RepairKind, TextualPass); 5] = [
    (RepairKind::StrayBackslash, escape_stray_backslashes),
    (RepairKind::MissingComma, insert_missing_commas),
    (RepairKind::TrailingComma, remove_trailing_commas),
    (RepairKind::ControlInString, escape_controls_in_strings),
    (RepairKind::ControlOutsideString, strip_controls_outside_strings),
];

/// Repair a candidate into valid JSON.
///
/// A candidate that already parses is returned byte-for-byte unchanged.
pub fn repair_json(candidate: &ExtractedJson) -> Result<RepairedJson, GenerationError> {
    let original = candidate.as_str();
    if let Ok(value) = serde_json::from_str::<Value>(original) {
        return Ok(RepairedJson {
            text: original.to_string(),
            value,
            repairs: Vec::new(),
        });
    }

    let mut repairs = Vec::new();
    let mut working = original.to_string();

    if Balance::of(&working).looks_truncated() {
        if let Some(closed) = close_truncated(&working) {
            tracing::debug!(
                original_len = working.len(),
                repaired_len = closed.len(),
                "closed truncated candidate"
            );
            working = closed;
            repairs.push(RepairKind::Truncation);
        }
    }

    for (kind, pass) in TEXTUAL_PASSES {
        if let Some(fixed) = pass(&working) {
            working = fixed;
            repairs.push(kind);
        }
    }

    match serde_json::from_str::<Value>(&working) {
        Ok(value) => {
            tracing::debug!(?repairs, "candidate repaired");
            Ok(RepairedJson {
                text: working,
                value,
                repairs,
            })
        }
        Err(e) => Err(GenerationError::RepairFailed {
            message: e.to_string(),
            preview: preview(&working),
        }),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Truncation pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: Container,
    open: usize,
}

/// A safe position to cut at, with an optional earlier position that
/// discards the partial array-element object the cut falls inside.
#[derive(Debug, Clone, Copy)]
struct Cut {
    end: usize,
    discard_from: Option<usize>,
}

impl Cut {
    fn at(end: usize) -> Self {
        Self {
            end,
            discard_from: None,
        }
    }

    /// Cut inside the innermost object. If that object is an array element,
    /// the whole object is dropped instead.
    fn inside_object(end: usize, stack: &[Frame]) -> Self {
        match stack {
            [.., parent, innermost]
                if innermost.kind == Container::Object && parent.kind == Container::Array =>
            {
                Self {
                    end,
                    discard_from: Some(innermost.open),
                }
            }
            _ => Self::at(end),
        }
    }

    fn position(self) -> usize {
        self.discard_from.unwrap_or(self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringRole {
    Key,
    PropertyValue,
    Element,
}

fn is_scalar_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')
}

/// Last structurally safe cut position in `text`, if any.
fn find_cut(text: &str) -> Option<usize> {
    let mut scanner = Scanner::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut last_sig: Option<char> = None;
    let mut role = StringRole::Key;
    let mut best: Option<Cut> = None;

    for (i, ch) in text.char_indices() {
        let after = i + ch.len_utf8();
        match scanner.feed(ch) {
            Step::QuoteOpen => {
                role = if last_sig == Some(':') {
                    StringRole::PropertyValue
                } else if stack.last().is_some_and(|f| f.kind == Container::Array) {
                    StringRole::Element
                } else {
                    StringRole::Key
                };
            }
            Step::QuoteClose => {
                match role {
                    StringRole::PropertyValue => best = Some(Cut::inside_object(after, &stack)),
                    StringRole::Element => best = Some(Cut::at(after)),
                    StringRole::Key => {}
                }
                last_sig = Some('"');
            }
            Step::InString(_) => {}
            Step::Structural(c) => match c {
                '{' => {
                    stack.push(Frame {
                        kind: Container::Object,
                        open: i,
                    });
                    best = Some(Cut::inside_object(after, &stack));
                    last_sig = Some(c);
                }
                '[' => {
                    stack.push(Frame {
                        kind: Container::Array,
                        open: i,
                    });
                    best = Some(Cut::at(after));
                    last_sig = Some(c);
                }
                '}' | ']' => {
                    stack.pop();
                    best = Some(Cut::at(after));
                    last_sig = Some(c);
                }
                ',' => {
                    // A comma proves the scalar before it is complete.
                    if last_sig.is_some_and(is_scalar_char) {
                        best = Some(match stack.last() {
                            Some(f) if f.kind == Container::Object => Cut::inside_object(i, &stack),
                            _ => Cut::at(i),
                        });
                    }
                    last_sig = Some(c);
                }
                c if c.is_whitespace() => {}
                c => last_sig = Some(c),
            },
        }
    }

    best.map(Cut::position)
}

/// Cut a truncated candidate back and close every open container.
fn close_truncated(text: &str) -> Option<String> {
    let cut = find_cut(text)?;
    let kept = text[..cut].trim_end_matches(|c: char| c.is_whitespace() || c == ',');

    let mut out = String::with_capacity(kept.len() + 8);
    out.push_str(kept);
    for container in open_containers(kept).iter().rev() {
        out.push(container.closer());
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Textual passes. Each returns `None` when it changed nothing.
// ---------------------------------------------------------------------------

fn is_valid_escape(rest: &[char]) -> bool {
    match rest.first() {
        Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => true,
        Some('u') => rest.len() >= 5 && rest[1..5].iter().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

fn escape_stray_backslashes(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut state = ScanState::Default;
    let mut changed = false;

    for (i, &ch) in chars.iter().enumerate() {
        match state {
            ScanState::Default => {
                if ch == '"' {
                    state = ScanState::InString;
                }
                out.push(ch);
            }
            ScanState::InString => match ch {
                '"' => {
                    state = ScanState::Default;
                    out.push(ch);
                }
                '\\' if is_valid_escape(&chars[i + 1..]) => {
                    state = ScanState::Escaped;
                    out.push(ch);
                }
                '\\' => {
                    out.push_str("\\\\");
                    changed = true;
                }
                _ => out.push(ch),
            },
            ScanState::Escaped => {
                state = ScanState::InString;
                out.push(ch);
            }
        }
    }

    changed.then_some(out)
}

fn insert_missing_commas(text: &str) -> Option<String> {
    let mut scanner = Scanner::new();
    let mut out = String::with_capacity(text.len() + 8);
    // Byte offset in `out` just after a value, while only whitespace follows it.
    let mut value_end: Option<usize> = None;
    let mut changed = false;

    for ch in text.chars() {
        match scanner.feed(ch) {
            Step::QuoteOpen => {
                if let Some(pos) = value_end.take() {
                    out.insert(pos, ',');
                    changed = true;
                }
                out.push(ch);
            }
            Step::QuoteClose => {
                out.push(ch);
                value_end = Some(out.len());
            }
            Step::InString(c) => out.push(c),
            Step::Structural(c) if c.is_whitespace() => out.push(c),
            Step::Structural(c) => {
                if matches!(c, '{' | '[') {
                    if let Some(pos) = value_end.take() {
                        out.insert(pos, ',');
                        changed = true;
                    }
                }
                out.push(c);
                value_end = if matches!(c, '}' | ']') || is_scalar_char(c) {
                    Some(out.len())
                } else {
                    None
                };
            }
        }
    }

    changed.then_some(out)
}

fn remove_trailing_commas(text: &str) -> Option<String> {
    let mut scanner = Scanner::new();
    let mut out = String::with_capacity(text.len());
    let mut pending_comma: Option<usize> = None;
    let mut changed = false;

    for ch in text.chars() {
        match scanner.feed(ch) {
            Step::Structural(',') => {
                pending_comma = Some(out.len());
                out.push(',');
            }
            Step::Structural(c) if c.is_whitespace() => out.push(c),
            Step::Structural(c) => {
                if matches!(c, '}' | ']') {
                    if let Some(pos) = pending_comma {
                        out.remove(pos);
                        changed = true;
                    }
                }
                pending_comma = None;
                out.push(c);
            }
            Step::QuoteOpen | Step::QuoteClose | Step::InString(_) => {
                pending_comma = None;
                out.push(ch);
            }
        }
    }

    changed.then_some(out)
}

fn escape_controls_in_strings(text: &str) -> Option<String> {
    let mut scanner = Scanner::new();
    let mut out = String::with_capacity(text.len() + 8);
    let mut changed = false;

    for ch in text.chars() {
        match scanner.feed(ch) {
            Step::InString('\n') => {
                out.push_str("\\n");
                changed = true;
            }
            Step::InString('\r') => {
                out.push_str("\\r");
                changed = true;
            }
            Step::InString('\t') => {
                out.push_str("\\t");
                changed = true;
            }
            Step::InString(c) if (c as u32) < 0x20 => changed = true,
            _ => out.push(ch),
        }
    }

    changed.then_some(out)
}

fn strip_controls_outside_strings(text: &str) -> Option<String> {
    let mut scanner = Scanner::new();
    let mut out = String::with_capacity(text.len());
    let mut changed = false;

    for ch in text.chars() {
        match scanner.feed(ch) {
            Step::Structural(c) if (c.is_control() && !c.is_whitespace()) || c == '\u{feff}' => {
                changed = true;
            }
            _ => out.push(ch),
        }
    }

    changed.then_some(out)
}
