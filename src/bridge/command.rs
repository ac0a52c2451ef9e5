//! Reply classification.
//!
//! Operators answer checkpoints in free text. `parse_command` maps any input to
//! exactly one `Command`; anything it cannot place is `Unknown`, which callers
//! treat conservatively.

use serde::Serialize;
use std::fmt;

const CONTINUE_WORDS: &[&str] = &["continue", "cont", "c", "yes", "y", "go", "proceed"];
const STOP_WORDS: &[&str] = &["stop", "halt", "cancel", "abort", "end", "quit"];
const APPROVE_WORDS: &[&str] = &["approve", "approved", "ok", "good", "accept"];
const REJECT_WORDS: &[&str] = &["reject", "rejected", "no", "n", "bad", "decline"];

/// A classified operator reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "parameter", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Continue,
    Stop,
    Approve,
    Reject,
    /// Proceed, carrying a note for the next iteration.
    Fix(String),
    /// Return to an earlier iteration; `None` when no number was given.
    /// Numbers too large for `u32` saturate to `u32::MAX`.
    Rollback(Option<u32>),
    /// Redo the plan with the given feedback.
    Revise(String),
    Unknown,
}

impl Command {
    /// Upper-case action name.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Continue => "CONTINUE",
            Command::Stop => "STOP",
            Command::Approve => "APPROVE",
            Command::Reject => "REJECT",
            Command::Fix(_) => "FIX",
            Command::Rollback(_) => "ROLLBACK",
            Command::Revise(_) => "REVISE",
            Command::Unknown => "UNKNOWN",
        }
    }

    /// Trailing parameter as text (empty when there is none).
    pub fn parameter(&self) -> String {
        match self {
            Command::Fix(note) | Command::Revise(note) => note.clone(),
            Command::Rollback(Some(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameter = self.parameter();
        if parameter.is_empty() {
            write!(f, "{}", self.action())
        } else {
            write!(f, "{}: {}", self.action(), parameter)
        }
    }
}

/// Classify free text into a `Command`. Total: every input maps to exactly one variant.
pub fn parse_command(text: &str) -> Command {
    let raw = text.trim();
    if raw.is_empty() {
        return Command::Unknown;
    }
    let lower = raw.to_lowercase();
    let word = lower.as_str();

    if CONTINUE_WORDS.contains(&word) {
        return Command::Continue;
    }
    if STOP_WORDS.contains(&word) {
        return Command::Stop;
    }
    if APPROVE_WORDS.contains(&word) {
        return Command::Approve;
    }
    if REJECT_WORDS.contains(&word) {
        return Command::Reject;
    }
    if let Some(rest) = strip_keyword(raw, &lower, "fix") {
        return Command::Fix(rest);
    }
    if let Some(rest) = lower.strip_prefix("rollback") {
        return Command::Rollback(rollback_target(rest));
    }
    if let Some(rest) = strip_keyword(raw, &lower, "revise") {
        return Command::Revise(rest);
    }
    Command::Unknown
}

/// First all-digit token after the keyword: "rollback 3", "ROLLBACK:3", "rollback to 3".
fn rollback_target(rest: &str) -> Option<u32> {
    rest.split(|c: char| c.is_whitespace() || c == ':')
        .find(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .map(|digits| digits.parse().unwrap_or(u32::MAX))
}

/// `keyword:` or `keyword ` prefix; returns the trimmed remainder with original casing.
fn strip_keyword(raw: &str, lower: &str, keyword: &str) -> Option<String> {
    let rest = lower.strip_prefix(keyword)?;
    if !(rest.starts_with(':') || rest.starts_with(' ')) {
        return None;
    }
    // ASCII keyword plus one ASCII separator, so this is a char boundary in `raw`.
    raw.get(keyword.len() + 1..).map(|s| s.trim().to_string())
}
