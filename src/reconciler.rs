//! Tracks server-suggested prefills and decides what a reply means.
//!
//! When the latest assistant turn carries a `prefilled_value`, the reply
//! field starts out holding it. On submit the reconciler reports whether
//! the user sent the suggestion unchanged or edited it; an edit of fixed
//! question 1 or 2 must also update the project's title or description.

use tracing::debug;

use crate::model::{ProjectField, Turn};

/// The prefill currently awaiting the user's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationContext {
    pub original_value: String,
    pub question_number: Option<u32>,
}

/// What submitting a reply implies beyond sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// No prefill was pending; send the text as typed.
    Plain,
    /// The prefill was sent unchanged.
    Accepted,
    /// The prefill was changed. `field` is `None` when the question number
    /// maps to no project field, in which case only the message is sent.
    Edited {
        question_number: Option<u32>,
        field: Option<ProjectField>,
        new_value: String,
    },
}

/// Per-conversation prefill tracker. Holds at most one context.
#[derive(Debug, Default)]
pub struct AnswerReconciler {
    context: Option<ReconciliationContext>,
}

impl AnswerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-reads the transcript after it changed. Returns the value the reply
    /// field should be pre-populated with, if any.
    pub fn observe(&mut self, turns: &[Turn]) -> Option<&str> {
        self.context = match turns.last() {
            Some(turn) if turn.is_assistant() => {
                turn.prefilled_value
                    .as_ref()
                    .map(|value| ReconciliationContext {
                        original_value: value.clone(),
                        question_number: turn.question_number,
                    })
            }
            _ => None,
        };

        if let Some(ctx) = &self.context {
            debug!(
                question_number = ?ctx.question_number,
                "prefill_context_established"
            );
        }

        self.context.as_ref().map(|c| c.original_value.as_str())
    }

    pub fn context(&self) -> Option<&ReconciliationContext> {
        self.context.as_ref()
    }

    /// Classifies the reply about to be sent. The context is consumed either
    /// way: it only answers the turn that created it.
    pub fn resolve_submission(&mut self, typed_value: &str) -> ReconciliationOutcome {
        let Some(ctx) = self.context.take() else {
            return ReconciliationOutcome::Plain;
        };

        if typed_value == ctx.original_value {
            return ReconciliationOutcome::Accepted;
        }

        let field = ctx.question_number.and_then(ProjectField::for_question);
        debug!(
            question_number = ?ctx.question_number,
            field = field.map(|f| f.label()),
            "prefill_edited"
        );

        ReconciliationOutcome::Edited {
            question_number: ctx.question_number,
            field,
            new_value: typed_value.to_string(),
        }
    }
}
