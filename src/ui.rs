//! Terminal rendering for the interview.

use std::time::Duration;

use crate::model::{BacklogItem, ChoiceKind, ProvisioningResult, StackTokens};
use crate::parser::{ParseTrace, ParsedTurn};

/// Maximum width of the prefilled value shown under a question.
pub const PREVIEW_MAX_LEN: usize = 60;

/// Formats a duration as M:SS (under 1 hour) or H:MM:SS (1+ hours).
pub fn format_elapsed(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Truncates a string to the given maximum length in characters, appending "..." if truncated.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    // Replace newlines with spaces for single-line display
    let single_line: String = s.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();

    if single_line.chars().count() <= max_len {
        single_line
    } else {
        let kept: String = single_line
            .chars()
            .take(max_len.saturating_sub(3))
            .collect();
        format!("{}...", kept)
    }
}

/// Contract a path by replacing the home directory with `~` for display.
pub fn contract_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(suffix) = path.strip_prefix(&home)
    {
        return format!("~/{}", suffix.display());
    }
    path.display().to_string()
}

/// Renders a question with numbered options.
///
/// ```text
/// Which backend technology will you use?
///
///   1. ( ) Node.js (Express)
///   2. ( ) Go
///
/// (pick one: type a number, or type your own answer)
/// ```
pub fn format_question(parsed: &ParsedTurn, prefill: Option<&str>) -> String {
    let mut out = parsed.question.clone();

    if let Some(options) = &parsed.options {
        out.push_str("\n\n");
        let mark = match options.kind {
            ChoiceKind::Single => "( )",
            ChoiceKind::Multiple => "[ ]",
        };
        for (i, choice) in options.choices.iter().enumerate() {
            out.push_str(&format!("  {}. {} {}\n", i + 1, mark, choice.label));
        }
        let hint = match options.kind {
            ChoiceKind::Single => "pick one: type a number, or type your own answer",
            ChoiceKind::Multiple => "pick any: type numbers like 1,3, or type your own answer",
        };
        out.push_str(&format!("\n({})", hint));
    }

    if let Some(value) = prefill {
        out.push_str(&format!(
            "\n[{}] (press Enter to keep)",
            truncate_str(value, PREVIEW_MAX_LEN)
        ));
    }

    out
}

/// Parses a selection like `2`, `1,3` or `1 3` into 1-based ordinals.
///
/// Returns `None` when the input is not purely numeric, so it can be sent as
/// free text instead.
pub fn parse_selection_input(input: &str) -> Option<Vec<usize>> {
    let ordinals = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    if ordinals.is_empty() {
        None
    } else {
        Some(ordinals)
    }
}

/// One line per stack field, `-` for unknown answers.
pub fn format_stack_summary(tokens: &StackTokens) -> String {
    tokens
        .fields()
        .iter()
        .map(|(field, token)| format!("  {:<9}{}", field, token.unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_item(item: &BacklogItem) -> String {
    format!("  #{} {} [{}]", item.id, item.title, item.status)
}

pub fn format_provisioning(result: &ProvisioningResult) -> String {
    let mut lines: Vec<String> = result.created_items.iter().map(format_item).collect();
    if !result.skipped_fields.is_empty() {
        lines.push(format!("  skipped: {}", result.skipped_fields.join(", ")));
    }
    lines.join("\n")
}

/// Compact one-line rendering of a parse trace.
pub fn format_parse_trace(trace: &ParseTrace) -> String {
    let mut out = format!(
        "parse: glyph={} checkbox={} headers={} question_lines={} option_lines={}",
        trace.glyph_found,
        trace.checkbox_found,
        trace.header_lines,
        trace.question_lines,
        trace.option_lines
    );
    if !trace.discarded_lines.is_empty() {
        out.push_str(&format!(" discarded={}", trace.discarded_lines.len()));
    }
    if let Some(reason) = trace.fallback {
        out.push_str(&format!(" fallback={:?}", reason));
    }
    out
}
