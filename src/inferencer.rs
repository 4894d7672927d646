//! Stack inference over the fixed onboarding questions.
//!
//! Once the fixed question sequence is answered, the four stack answers
//! (backend, database, frontend, CSS) are turned into normalized tokens such
//! as `nodejs` or `tailwindcss`. Inference only fires inside a narrow
//! transcript-length window and only when the first stack question mentions
//! "backend", so unrelated conversations of the same length never match.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::lexicon::BULLET_GLYPHS;
use crate::model::{Role, StackTokens, Turn};

/// Substring the first stack question must contain (any case).
pub const STACK_SIGNATURE: &str = "backend";

/// Number of stack questions: backend, database, frontend, CSS.
const STACK_QUESTIONS: usize = 4;

/// Answers meaning "no answer" rather than a technology.
const UNKNOWN_PREFIXES: &[&str] = &["i don't know", "i don’t know", "not sure", "skip", "❓"];

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

/// Leading run of letters, spaces, dots and hyphens ending at `(` or the end.
static LEADING_NAME: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"^([\p{L}\s.\-]+?)\s*(?:\(|$)"));

/// Which fixed question sequence the conversation follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionSequence {
    /// Name, description, then the four stack questions.
    #[default]
    Standard,
    /// The four stack questions only.
    Legacy,
}

impl QuestionSequence {
    pub fn from_question_count(count: u32) -> Option<Self> {
        match count {
            6 => Some(Self::Standard),
            4 => Some(Self::Legacy),
            _ => None,
        }
    }

    pub fn question_count(&self) -> usize {
        match self {
            Self::Standard => 6,
            Self::Legacy => 4,
        }
    }

    /// Zero-based position of the backend question within the sequence.
    pub fn first_stack_question(&self) -> usize {
        self.question_count() - STACK_QUESTIONS
    }

    /// Transcript lengths at which inference may fire: every fixed question
    /// answered, optionally followed by the next assistant turn.
    pub fn window(&self) -> RangeInclusive<usize> {
        let exchanges = self.question_count() * 2;
        exchanges..=exchanges + 1
    }
}

/// Extracts stack tokens from a completed fixed question sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackInferencer {
    sequence: QuestionSequence,
}

impl StackInferencer {
    pub fn new(sequence: QuestionSequence) -> Self {
        Self { sequence }
    }

    /// Returns the stack tokens when the transcript is exactly a completed
    /// fixed sequence, otherwise `None`. Pure; callers retry on growth.
    pub fn try_infer(&self, transcript: &[Turn]) -> Option<StackTokens> {
        let seq = self.sequence;

        if !seq.window().contains(&transcript.len()) {
            return None;
        }

        let assistant_turns: Vec<&Turn> = transcript.iter().filter(|t| t.is_assistant()).collect();
        if assistant_turns.len() < seq.question_count() {
            debug!(
                assistant_turns = assistant_turns.len(),
                "stack_inference_too_few_questions"
            );
            return None;
        }

        let signature_turn = assistant_turns[seq.first_stack_question()];
        if !signature_turn
            .content
            .to_lowercase()
            .contains(STACK_SIGNATURE)
        {
            debug!("stack_inference_signature_missing");
            return None;
        }

        let answers: Vec<&str> = (0..STACK_QUESTIONS)
            .map(|i| self.stack_answer(transcript, seq.first_stack_question() + i))
            .collect();

        if answers.iter().all(|a| a.trim().is_empty()) {
            debug!("stack_inference_no_answers");
            return None;
        }

        let tokens = StackTokens {
            backend: normalize_answer(answers[0]),
            database: normalize_answer(answers[1]),
            frontend: normalize_answer(answers[2]),
            css: normalize_answer(answers[3]),
        };
        debug!(?tokens, "stack_inferred");
        Some(tokens)
    }

    /// The user's reply to the fixed question at zero-based `position`.
    ///
    /// Assistant turns tagged with `question_number` are located by tag so a
    /// stray system turn does not shift the answers. Untagged transcripts use
    /// the fixed offset `2 * position + 1`.
    fn stack_answer<'a>(&self, transcript: &'a [Turn], position: usize) -> &'a str {
        let number = (position + 1) as u32;
        let offset = transcript
            .iter()
            .position(|t| t.is_assistant() && t.question_number == Some(number))
            .map(|i| i + 1)
            .unwrap_or(position * 2 + 1);

        match transcript.get(offset) {
            Some(turn) if turn.role == Role::User => turn.content.as_str(),
            _ => "",
        }
    }
}

/// Turns a free-text stack answer into a token, or `None` for
/// "don't know" style answers.
///
/// `"○ Next.js (recommended)"` becomes `"nextjs"`, `"Tailwind CSS"` becomes
/// `"tailwindcss"`.
pub fn normalize_answer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unbulleted = match trimmed.chars().next() {
        Some(c) if BULLET_GLYPHS.contains(&c) => trimmed[c.len_utf8()..].trim(),
        _ => trimmed,
    };
    let cleaned = unbulleted.to_lowercase();

    if cleaned.is_empty()
        || cleaned == "none"
        || UNKNOWN_PREFIXES.iter().any(|p| cleaned.starts_with(p))
    {
        return None;
    }

    let name = match LEADING_NAME.captures(&cleaned).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => cleaned
            .split([',', ' '])
            .find(|s| !s.is_empty())
            .unwrap_or(""),
    };

    let token: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .collect();

    if token.is_empty() { None } else { Some(token) }
}
