//! Option parser for assistant turns.
//!
//! Assistant text often encodes a choice question inline: a prompt, an
//! optional `OPTIONS:` header, then one option per line led by a checkbox,
//! radio or dash marker. `parse` recovers the prompt and the choices from
//! that text. It never fails: anything it cannot read as a choice question
//! comes back as a plain prompt the user can answer in free text.

use crate::lexicon::{
    DASH_MARKERS, HEADER_SYNONYMS, contains_checkbox, contains_marker_glyph,
    is_marker_glyph, strip_header_prefix,
};
use crate::model::{Choice, ChoiceKind, ChoiceOptions, Turn};

/// Maximum length of a choice slug.
const VALUE_MAX_LEN: usize = 50;

/// A turn's text split into the question and its selectable options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTurn {
    pub question: String,
    pub options: Option<ChoiceOptions>,
}

impl ParsedTurn {
    /// A prompt without options, carrying the text verbatim.
    pub fn plain(content: &str) -> Self {
        Self {
            question: content.to_string(),
            options: None,
        }
    }

    pub fn has_options(&self) -> bool {
        self.options.is_some()
    }

    /// Parses a turn, preferring the server-supplied options when present.
    pub fn from_turn(turn: &Turn) -> Self {
        match &turn.options {
            Some(options) => Self {
                question: turn.content.clone(),
                options: Some(options.clone()),
            },
            None => parse(&turn.content),
        }
    }
}

/// Why a parse produced no options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No checkbox or radio glyph anywhere in the text.
    NoGlyph,
    /// Glyphs were present but no line started with a marker.
    NoOptionLines,
}

/// Diagnostics collected while parsing. Callers decide whether to log it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseTrace {
    pub glyph_found: bool,
    pub checkbox_found: bool,
    pub header_lines: usize,
    pub question_lines: usize,
    pub option_lines: usize,
    /// Non-option lines seen after the option block started.
    pub discarded_lines: Vec<String>,
    pub fallback: Option<FallbackReason>,
}

enum LineClass<'a> {
    Header,
    Option(&'a str),
    Text,
}

/// Classifies one line. Leading header synonyms are peeled off first so that
/// `OPTIONS: ☐ A` counts as a header followed by an option.
fn classify(line: &str) -> LineClass<'_> {
    let mut rest = line;
    let mut headers = 0;
    while let Some(after) = strip_header_prefix(rest) {
        rest = after;
        headers += 1;
    }

    if headers > 0 && rest.trim().is_empty() {
        return LineClass::Header;
    }

    match option_label(rest) {
        Some(label) => LineClass::Option(label),
        None => LineClass::Text,
    }
}

/// Strips exactly one leading marker and returns the label, if any text remains.
fn option_label(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();

    let rest = match trimmed.chars().next() {
        Some(c) if is_marker_glyph(c) => &trimmed[c.len_utf8()..],
        Some(_) => {
            let marker = DASH_MARKERS.iter().find(|m| trimmed.starts_with(**m))?;
            &trimmed[marker.len()..]
        }
        None => return None,
    };

    let label = rest.trim();
    if label.is_empty() { None } else { Some(label) }
}

/// Lowercase slug of a label: whitespace runs become `_`, anything outside
/// `[a-z0-9_]` is dropped, capped at 50 characters.
pub fn slugify(label: &str, index: usize) -> String {
    let lowered = label.to_lowercase();
    let mut slug: String = lowered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    slug.truncate(VALUE_MAX_LEN);

    if slug.is_empty() {
        format!("option_{}", index)
    } else {
        slug
    }
}

/// Removes uppercase header synonyms left inside question text. A line is
/// left untouched when the removal would turn it into a header or option.
fn strip_residual_headers(line: &str) -> String {
    let mut cleaned = line.to_string();
    for header in HEADER_SYNONYMS {
        cleaned = cleaned.replace(header, "");
    }

    match classify(&cleaned) {
        LineClass::Text => cleaned,
        LineClass::Header | LineClass::Option(_) => line.to_string(),
    }
}

/// Parses assistant text into a question and optional choices.
pub fn parse(content: &str) -> ParsedTurn {
    parse_with_trace(content).0
}

/// Same as [`parse`], also returning what the parser saw.
pub fn parse_with_trace(content: &str) -> (ParsedTurn, ParseTrace) {
    let mut trace = ParseTrace::default();

    if !contains_marker_glyph(content) {
        trace.fallback = Some(FallbackReason::NoGlyph);
        return (ParsedTurn::plain(content), trace);
    }
    trace.glyph_found = true;
    trace.checkbox_found = contains_checkbox(content);

    let mut question_lines: Vec<&str> = Vec::new();
    let mut labels: Vec<&str> = Vec::new();
    let mut found_options = false;

    for raw_line in content.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        match classify(line) {
            LineClass::Header => {
                found_options = true;
                trace.header_lines += 1;
            }
            LineClass::Option(label) => {
                found_options = true;
                labels.push(label);
            }
            LineClass::Text if !found_options => question_lines.push(line),
            LineClass::Text => {
                if !line.trim().is_empty() {
                    trace.discarded_lines.push(line.to_string());
                }
            }
        }
    }

    trace.question_lines = question_lines.len();
    trace.option_lines = labels.len();

    if labels.is_empty() {
        trace.fallback = Some(FallbackReason::NoOptionLines);
        return (ParsedTurn::plain(content), trace);
    }

    let choices = labels
        .iter()
        .enumerate()
        .map(|(index, label)| Choice {
            id: format!("opt-{}", index),
            label: label.to_string(),
            value: slugify(label, index),
        })
        .collect();

    let kind = if trace.checkbox_found {
        ChoiceKind::Multiple
    } else {
        ChoiceKind::Single
    };

    let question = question_lines
        .iter()
        .map(|line| strip_residual_headers(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    (
        ParsedTurn {
            question,
            options: Some(ChoiceOptions { kind, choices }),
        },
        trace,
    )
}

/// Renders choices as marker lines: `☐` for multi-select, `○` for single.
pub fn render_options(options: &ChoiceOptions) -> String {
    let glyph = match options.kind {
        ChoiceKind::Multiple => '☐',
        ChoiceKind::Single => '○',
    };
    options
        .choices
        .iter()
        .map(|c| format!("{} {}", glyph, c.label))
        .collect::<Vec<_>>()
        .join("\n")
}
