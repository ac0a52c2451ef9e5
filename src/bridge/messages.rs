//! Outbound message text.
//!
//! Messages are sent with HTML parse mode, so every interpolated user or plan
//! string goes through `escape_html` first.

use crate::money::Usd;
use crate::util::truncate_chars;

/// Longest plan excerpt shown in an approval prompt, after escaping.
pub const PLAN_EXCERPT_CHARS: usize = 3000;
/// Longest alert body, after escaping.
pub const ALERT_BODY_CHARS: usize = 3500;
const MAX_LISTED_ITERATION_FILES: usize = 10;
const MAX_LISTED_FINAL_FILES: usize = 15;

/// Alert styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Warning,
    Error,
    Success,
}

impl AlertKind {
    fn emoji(self) -> &'static str {
        match self {
            AlertKind::Info => "ℹ️",
            AlertKind::Warning => "⚠️",
            AlertKind::Error => "🚨",
            AlertKind::Success => "✅",
        }
    }
}

fn entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        _ => None,
    }
}

/// Escape the three characters HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match entity(ch) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(ch),
        }
    }
    out
}

/// Escape `text` so the result, `suffix` included, fits in `max_chars`.
/// Cuts fall between characters of the source, never inside an entity.
pub fn escape_truncated(text: &str, max_chars: usize, suffix: &str) -> String {
    let escaped = escape_html(text);
    if escaped.chars().count() <= max_chars {
        return escaped;
    }
    let budget = max_chars.saturating_sub(suffix.chars().count());
    let mut out = String::with_capacity(budget + suffix.len());
    let mut used = 0;
    for ch in text.chars() {
        let width = entity(ch).map_or(1, str::len);
        if used + width > budget {
            break;
        }
        match entity(ch) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(ch),
        }
        used += width;
    }
    out.push_str(suffix);
    out
}

/// Cut already-formatted markup to `max_chars`, backing off from any entity or
/// tag the cut would leave open.
pub fn truncate_markup(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    loop {
        let open_entity = out.rfind('&').filter(|&i| !out[i..].contains(';'));
        let open_tag = out.rfind('<').filter(|&i| !out[i..].contains('>'));
        match open_entity.max(open_tag) {
            Some(i) => out.truncate(i),
            None => break,
        }
    }
    out.push_str(suffix);
    out
}

fn bullet_list(items: &[String], max: usize, more_label: &str) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(max)
        .map(|f| format!("• {}", escape_html(f)))
        .collect();
    if items.len() > max {
        lines.push(format!("• ... and {} more{}", items.len() - max, more_label));
    }
    lines.join("\n")
}

pub fn alert(title: &str, body: &str, kind: AlertKind) -> String {
    format!(
        "{} <b>{}</b>\n{}\n\n{}",
        kind.emoji(),
        escape_html(title),
        "═".repeat(30),
        escape_truncated(body, ALERT_BODY_CHARS, "...")
    )
}

pub fn build_started(project: &str) -> String {
    format!(
        "Starting build: <b>{}</b>\n\nPhase 1: Interview",
        escape_html(project)
    )
}

pub fn build_resumed(project: &str, phase: &str) -> String {
    format!(
        "Resuming build: <b>{}</b>\nPhase: {}",
        escape_html(project),
        phase
    )
}

pub fn interview_question(number: usize, total: usize, question: &str) -> String {
    format!(
        "📋 <b>Question {}/{}</b>\n\n{}\n\n<i>Reply with your answer...</i>",
        number,
        total,
        escape_html(question)
    )
}

pub fn plan_approval(plan: &str, estimated_cost: Usd) -> String {
    format!(
        "📋 <b>PHASE 2 COMPLETE: Implementation Plan</b>\n\n{}\n\n\
         <b>Estimated Cost:</b> {}\n\n\
         🎮 <b>YOUR DECISION:</b>\n\
         [APPROVE] → Start building\n\
         [REVISE: feedback] → Fix plan\n\
         [REJECT] → Cancel build",
        escape_truncated(plan, PLAN_EXCERPT_CHARS, "\n\n... (truncated)"),
        estimated_cost
    )
}

pub fn plan_revising(attempt: u32) -> String {
    format!("Revising plan (attempt {})...", attempt)
}

pub fn build_phase_started(iterations: usize) -> String {
    format!(
        "🔨 <b>PHASE 3: Build</b>\n\nPlanned iterations: {}",
        iterations
    )
}

pub fn iteration_result(
    index: u32,
    total: u32,
    files: &[String],
    tests_passed: bool,
    cost: Usd,
) -> String {
    let files_list = if files.is_empty() {
        "• (no changes)".to_string()
    } else {
        bullet_list(files, MAX_LISTED_ITERATION_FILES, "")
    };
    let tests = if tests_passed { "✅ passed" } else { "❌ failed" };
    format!(
        "🔨 <b>ITERATION {}/{} COMPLETE</b>\n\n\
         <b>Files:</b>\n{}\n\n\
         <b>Tests:</b> {}\n\
         <b>Cost this iteration:</b> {}\n\n\
         🎮 <b>YOUR COMMAND:</b>\n\
         [CONTINUE] [FIX: issue] [STOP] [ROLLBACK: N]",
        index, total, files_list, tests, cost
    )
}

pub fn unclear_reply(reply: &str) -> String {
    format!(
        "Didn't understand <code>{}</code>. Reply CONTINUE, STOP, FIX: issue or ROLLBACK N.",
        escape_html(&truncate_chars(reply, 50, "..."))
    )
}

pub fn applying_fix(note: &str) -> String {
    format!("Applying fix: {}...", escape_html(note))
}

pub fn rolled_back(target: u32) -> String {
    format!("Rolled back to iteration {}", target)
}

pub fn rollback_unknown(target: u32) -> String {
    format!("No iteration {} to roll back to; continuing", target)
}

pub fn build_complete(
    final_path: &str,
    total_cost: Usd,
    iterations: u32,
    files: &[String],
) -> String {
    format!(
        "✅ <b>BUILD COMPLETE</b>\n\n\
         <b>Location:</b> <code>{}</code>\n\
         <b>Total Cost:</b> {}\n\
         <b>Iterations:</b> {}\n\n\
         <b>Files:</b>\n{}\n\n\
         📋 <b>NEXT STEPS:</b>\n\
         1. Review code in FINAL/ directory\n\
         2. Run the tests in FINAL/tests/\n\
         3. Deploy when ready (manual)",
        escape_html(final_path),
        total_cost,
        iterations,
        bullet_list(files, MAX_LISTED_FINAL_FILES, " files")
    )
}

pub fn build_stopped(iteration: u32) -> String {
    format!("⏹ Build stopped at iteration {}. Resume with <code>ralph resume</code>.", iteration)
}

pub fn still_paused(reason: Option<&str>) -> String {
    format!(
        "Build is paused ({}). Resume with <code>ralph resume --continue</code>.",
        escape_html(reason.unwrap_or("no reason recorded"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_escape_truncated_never_splits_entities() {
        let body = format!("xxx{}", "a&".repeat(1500));
        let out = escape_truncated(&body, 100, "...");
        assert!(out.chars().count() <= 100);
        let head = out.strip_suffix("...").unwrap();
        assert!(head.ends_with("&amp;") || head.ends_with('a'));
        assert_eq!(head.matches('&').count(), head.matches("&amp;").count());
    }

    #[test]
    fn test_escape_truncated_short_text_untouched() {
        assert_eq!(escape_truncated("a < b", 100, "..."), "a &lt; b");
    }

    #[test]
    fn test_truncate_markup_backs_off_open_entity_and_tag() {
        assert_eq!(truncate_markup("abc&amp;def", 8, "..."), "abc...");
        assert_eq!(truncate_markup("ab<b>cd</b>", 7, "..."), "ab...");
        assert_eq!(truncate_markup("short", 10, "..."), "short");
    }

    #[test]
    fn test_long_alert_body_stays_well_formed() {
        let body = format!("xxx{}", "a&".repeat(1500));
        let msg = alert("Build Failed", &body, AlertKind::Error);
        assert!(msg.chars().count() < 4000);
        assert!(msg.ends_with("..."));
        assert!(!msg.contains("&am..."));
    }

    #[test]
    fn test_interview_question_numbers() {
        let msg = interview_question(2, 5, "What <fields>?");
        assert!(msg.contains("Question 2/5"));
        assert!(msg.contains("What &lt;fields&gt;?"));
    }

    #[test]
    fn test_plan_approval_truncates_long_plan() {
        let plan = "x".repeat(PLAN_EXCERPT_CHARS + 500);
        let msg = plan_approval(&plan, Usd::cents(350));
        assert!(msg.contains("... (truncated)"));
        assert!(msg.contains("$3.50"));
        assert!(!msg.contains(&"x".repeat(PLAN_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn test_plan_approval_escaped_excerpt_is_bounded() {
        let plan = "<b>&</b>".repeat(1000);
        let msg = plan_approval(&plan, Usd::cents(100));
        assert!(msg.chars().count() < 4000);
        assert!(msg.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(msg.contains("... (truncated)"));
    }

    #[test]
    fn test_plan_approval_short_plan_intact() {
        let msg = plan_approval("# Plan", Usd::cents(100));
        assert!(msg.contains("# Plan"));
        assert!(!msg.contains("truncated"));
    }

    #[test]
    fn test_iteration_result_lists_limited_files() {
        let files: Vec<String> = (0..12).map(|i| format!("f{}.py", i)).collect();
        let msg = iteration_result(3, 7, &files, true, Usd::cents(50));
        assert!(msg.contains("ITERATION 3/7"));
        assert!(msg.contains("• f9.py"));
        assert!(!msg.contains("• f10.py"));
        assert!(msg.contains("... and 2 more"));
    }

    #[test]
    fn test_alert_has_title_and_body() {
        let msg = alert("Build Paused", "Budget limit reached", AlertKind::Warning);
        assert!(msg.starts_with("⚠️ <b>Build Paused</b>"));
        assert!(msg.ends_with("Budget limit reached"));
    }

    #[test]
    fn test_build_complete_lists_files() {
        let files = vec!["README.md".to_string(), "src/main.py".to_string()];
        let msg = build_complete("/tmp/b/FINAL", Usd::cents(410), 7, &files);
        assert!(msg.contains("<code>/tmp/b/FINAL</code>"));
        assert!(msg.contains("$4.10"));
        assert!(msg.contains("• src/main.py"));
    }
}
