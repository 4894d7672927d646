//! Drives one bootstrap conversation.
//!
//! A session owns the transcript, the prefill reconciler and the stack
//! inferencer for a single conversation, and talks to the server through
//! the [`Collaborator`] seam. Sending the user's turn is the only call whose
//! failure reaches the user; project-field updates and stack saves are
//! best-effort side effects of a message that was already sent.

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use crate::choice::ChoiceAnswer;
use crate::error::KickoffError;
use crate::inferencer::StackInferencer;
use crate::model::{ProjectField, ProvisioningResult, StackTokens, Turn};
use crate::parser::{ParsedTurn, parse_with_trace};
use crate::reconciler::{AnswerReconciler, ReconciliationOutcome};

/// Server calls the session depends on.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Appends the user turn, runs the server side, returns the full transcript.
    async fn send_turn(
        &self,
        conversation_id: &str,
        content: &str,
        selected_option_ids: Option<&[String]>,
    ) -> Result<Vec<Turn>, KickoffError>;

    async fn update_project_field(
        &self,
        conversation_id: &str,
        field: ProjectField,
        value: &str,
    ) -> Result<(), KickoffError>;

    async fn save_stack_configuration(
        &self,
        conversation_id: &str,
        tokens: &StackTokens,
    ) -> Result<ProvisioningResult, KickoffError>;
}

/// A reply typed or picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Choice(ChoiceAnswer),
}

impl Reply {
    pub fn content(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Choice(answer) => &answer.content,
        }
    }
}

/// Everything that happened while submitting one reply.
#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub outcome: ReconciliationOutcome,
    /// Error from the best-effort project-field update, if it failed.
    pub field_sync_error: Option<String>,
    /// Stack tokens, on the one submission that completed the fixed sequence.
    pub stack: Option<StackTokens>,
    pub provisioning: Option<ProvisioningResult>,
    /// Error from the best-effort stack save, if it failed.
    pub stack_save_error: Option<String>,
}

pub struct BootstrapSession<C: Collaborator> {
    conversation_id: String,
    collaborator: C,
    transcript: Vec<Turn>,
    reconciler: AnswerReconciler,
    inferencer: StackInferencer,
    /// Set once a stack save has been attempted for this conversation.
    stack_saved: bool,
    save_stack: bool,
}

impl<C: Collaborator> BootstrapSession<C> {
    pub fn new(
        conversation_id: impl Into<String>,
        collaborator: C,
        transcript: Vec<Turn>,
        inferencer: StackInferencer,
    ) -> Self {
        let mut session = Self {
            conversation_id: conversation_id.into(),
            collaborator,
            transcript,
            reconciler: AnswerReconciler::new(),
            inferencer,
            stack_saved: false,
            save_stack: true,
        };
        session.reconciler.observe(&session.transcript);
        session
    }

    /// Disables the stack save side effect (inference still runs).
    pub fn with_stack_save(mut self, enabled: bool) -> Self {
        self.save_stack = enabled;
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn stack_saved(&self) -> bool {
        self.stack_saved
    }

    /// The value the reply field should start with, if any.
    pub fn prefill(&self) -> Option<&str> {
        self.reconciler
            .context()
            .map(|ctx| ctx.original_value.as_str())
    }

    /// The latest assistant turn, parsed. `None` before the server spoke.
    pub fn current_question(&self) -> Option<ParsedTurn> {
        let turn = self.transcript.iter().rev().find(|t| t.is_assistant())?;
        if turn.options.is_some() {
            return Some(ParsedTurn::from_turn(turn));
        }

        let (parsed, trace) = parse_with_trace(&turn.content);
        trace!(
            glyph_found = trace.glyph_found,
            header_lines = trace.header_lines,
            option_lines = trace.option_lines,
            discarded = trace.discarded_lines.len(),
            fallback = ?trace.fallback,
            "option_parse"
        );
        Some(parsed)
    }

    /// Sends one reply and runs its side effects.
    ///
    /// The send error is returned; field-update and stack-save errors are
    /// logged and recorded in the report instead.
    pub async fn submit(&mut self, reply: Reply) -> Result<SubmitReport, KickoffError> {
        let outcome = self.reconciler.resolve_submission(reply.content());
        debug!(outcome = ?outcome, "reply_resolved");

        let mut report = SubmitReport {
            outcome: outcome.clone(),
            field_sync_error: None,
            stack: None,
            provisioning: None,
            stack_save_error: None,
        };

        if let ReconciliationOutcome::Edited {
            field: Some(field),
            new_value,
            ..
        } = &outcome
        {
            match self
                .collaborator
                .update_project_field(&self.conversation_id, *field, new_value)
                .await
            {
                Ok(()) => info!(field = field.label(), "project_field_updated"),
                Err(e) => {
                    warn!(field = field.label(), error = %e, "project_field_update_failed");
                    report.field_sync_error = Some(e.to_string());
                }
            }
        }

        let selected = match &reply {
            Reply::Choice(answer) => Some(answer.selected_option_ids.as_slice()),
            Reply::Text(_) => None,
        };
        let transcript = self
            .collaborator
            .send_turn(&self.conversation_id, reply.content(), selected)
            .await?;
        debug!(turns = transcript.len(), "transcript_updated");

        self.transcript = transcript;
        self.reconciler.observe(&self.transcript);

        if !self.stack_saved
            && let Some(tokens) = self.inferencer.try_infer(&self.transcript)
        {
            info!(?tokens, "stack_inference_complete");
            self.stack_saved = true;
            if self.save_stack {
                match self
                    .collaborator
                    .save_stack_configuration(&self.conversation_id, &tokens)
                    .await
                {
                    Ok(result) => {
                        info!(
                            created = result.created_items.len(),
                            skipped = result.skipped_fields.len(),
                            "stack_configuration_saved"
                        );
                        report.provisioning = Some(result);
                    }
                    Err(e) => {
                        warn!(error = %e, "stack_configuration_save_failed");
                        report.stack_save_error = Some(e.to_string());
                    }
                }
            }
            report.stack = Some(tokens);
        }

        Ok(report)
    }
}
