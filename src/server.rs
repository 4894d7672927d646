//! Local stand-in for the bootstrap server.
//!
//! Serves the fixed onboarding questions from SQLite so the interview runs
//! offline. It answers free-form requirements with a fixed acknowledgement
//! and never generates questions of its own.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::KickoffError;
use crate::inferencer::QuestionSequence;
use crate::model::{
    Choice, ChoiceKind, ChoiceOptions, ProjectField, ProvisioningResult, StackTokens, Turn,
};
use crate::parser::{render_options, slugify};
use crate::session::Collaborator;
use crate::store::Store;
use crate::templates;
use crate::workflow::{BacklogStatus, WorkflowService};

/// Generates an 8-character random hex conversation ID.
fn generate_conversation_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 4] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// The fixed questions for one conversation, plus prefill hints.
#[derive(Debug, Clone, Default)]
pub struct QuestionScript {
    pub sequence: QuestionSequence,
    /// Suggested project name (question 1 of the standard sequence).
    pub name_hint: Option<String>,
    /// Suggested description (question 2 of the standard sequence).
    pub description_hint: Option<String>,
}

impl QuestionScript {
    /// All fixed questions in order, tagged with their 1-based number.
    pub fn questions(&self) -> Vec<Turn> {
        let mut questions = Vec::new();

        if self.sequence == QuestionSequence::Standard {
            questions.push(with_hint(
                Turn::assistant(templates::NAME_QUESTION),
                self.name_hint.as_deref(),
            ));
            questions.push(with_hint(
                Turn::assistant(templates::DESCRIPTION_QUESTION),
                self.description_hint.as_deref(),
            ));
        }

        questions.push(Turn::assistant(templates::BACKEND_QUESTION));
        questions.push(Turn::assistant(format!(
            "{}\n\n{}",
            templates::DATABASE_QUESTION,
            render_options(&single_choice("db", templates::DATABASE_CHOICES))
        )));
        questions.push(
            Turn::assistant(templates::FRONTEND_QUESTION)
                .with_options(single_choice("frontend", templates::FRONTEND_CHOICES)),
        );
        questions.push(Turn::assistant(templates::CSS_QUESTION));

        questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| q.with_question_number(i as u32 + 1))
            .collect()
    }

    /// The assistant turn that follows the given number of user answers.
    fn turn_after(&self, answers: usize) -> Turn {
        let mut questions = self.questions();
        let count = questions.len();
        if answers < count {
            questions.swap_remove(answers)
        } else if answers == count {
            Turn::assistant(templates::CLOSING_MESSAGE)
        } else {
            Turn::assistant(templates::REQUIREMENT_ACK)
        }
    }
}

fn with_hint(turn: Turn, hint: Option<&str>) -> Turn {
    match hint.map(str::trim) {
        Some(h) if !h.is_empty() => turn.with_prefill(h),
        _ => turn,
    }
}

fn single_choice(prefix: &str, labels: &[&str]) -> ChoiceOptions {
    ChoiceOptions {
        kind: ChoiceKind::Single,
        choices: labels
            .iter()
            .enumerate()
            .map(|(i, label)| Choice {
                id: format!("{}-{}", prefix, i),
                label: label.to_string(),
                value: slugify(label, i),
            })
            .collect(),
    }
}

/// Backlog item title for a known stack token.
fn provisioning_title(field: &str, token: &str) -> String {
    match field {
        "backend" => format!("Set up {} backend", token),
        "database" => format!("Provision {} database", token),
        "frontend" => format!("Scaffold {} frontend", token),
        _ => format!("Configure {} styling", token),
    }
}

pub struct LocalServer {
    store: Mutex<Store>,
    script: QuestionScript,
}

impl LocalServer {
    pub fn new(store: Store, script: QuestionScript) -> Self {
        Self {
            store: Mutex::new(store),
            script,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>, KickoffError> {
        self.store
            .lock()
            .map_err(|_| KickoffError::Collaborator("Store lock poisoned".to_string()))
    }

    /// Creates a conversation and posts the first fixed question.
    /// Returns the conversation id and the initial transcript.
    pub fn start_conversation(&self) -> Result<(String, Vec<Turn>), KickoffError> {
        let store = self.store()?;
        let id = generate_conversation_id();
        let title = self.script.name_hint.clone().unwrap_or_default();
        store.create_conversation(&id, &title)?;
        if let Some(description) = self.script.description_hint.as_deref() {
            store.update_project_field(&id, ProjectField::Description, description.trim())?;
        }
        store.append_turn(&id, &self.script.turn_after(0))?;
        info!(conversation_id = %id, "conversation_started");
        Ok((id.clone(), store.turns(&id)?))
    }

    /// Runs a closure against the store (CLI reporting).
    pub fn with_store<T>(
        &self,
        f: impl FnOnce(&Store) -> Result<T, KickoffError>,
    ) -> Result<T, KickoffError> {
        let store = self.store()?;
        f(&store)
    }
}

#[async_trait]
impl Collaborator for LocalServer {
    async fn send_turn(
        &self,
        conversation_id: &str,
        content: &str,
        selected_option_ids: Option<&[String]>,
    ) -> Result<Vec<Turn>, KickoffError> {
        let store = self.store()?;
        let answered = store
            .turns(conversation_id)?
            .iter()
            .filter(|t| t.is_user())
            .count();

        let mut user = Turn::user(content);
        if let Some(ids) = selected_option_ids {
            user = user.with_selected_ids(ids.to_vec());
        }
        let reply = self.script.turn_after(answered + 1);
        store.append_exchange(conversation_id, &user, &reply)?;
        debug!(conversation_id, answered = answered + 1, "turn_recorded");

        store.turns(conversation_id)
    }

    async fn update_project_field(
        &self,
        conversation_id: &str,
        field: ProjectField,
        value: &str,
    ) -> Result<(), KickoffError> {
        self.store()?
            .update_project_field(conversation_id, field, value)
    }

    async fn save_stack_configuration(
        &self,
        conversation_id: &str,
        tokens: &StackTokens,
    ) -> Result<ProvisioningResult, KickoffError> {
        let store = self.store()?;
        store.save_stack(conversation_id, tokens)?;

        let mut result = ProvisioningResult::default();
        for (field, token) in tokens.fields() {
            match token {
                Some(token) => {
                    let item = store.create_item(conversation_id, &provisioning_title(field, token))?;
                    result.created_items.push(item);
                }
                None => result.skipped_fields.push(field.to_string()),
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl WorkflowService for LocalServer {
    async fn list_valid_transitions(&self, item_id: i64) -> Result<Vec<String>, KickoffError> {
        let item = self.store()?.item(item_id)?;
        let status = BacklogStatus::from_str(&item.status)
            .ok_or_else(|| KickoffError::UnknownStatus(item.status.clone()))?;
        Ok(status
            .allowed_targets()
            .iter()
            .map(|s| s.label().to_string())
            .collect())
    }

    async fn apply_transition(
        &self,
        item_id: i64,
        to_status: &str,
        reason: Option<&str>,
    ) -> Result<(), KickoffError> {
        let store = self.store()?;
        let item = store.item(item_id)?;
        let from = BacklogStatus::from_str(&item.status)
            .ok_or_else(|| KickoffError::UnknownStatus(item.status.clone()))?;
        let to = BacklogStatus::from_str(to_status)
            .ok_or_else(|| KickoffError::UnknownStatus(to_status.to_string()))?;

        if !from.can_transition_to(to) {
            warn!(item_id, from = from.label(), to = to.label(), "transition_rejected");
            return Err(KickoffError::InvalidTransition {
                item_id,
                to: to.label().to_string(),
                allowed: from
                    .allowed_targets()
                    .iter()
                    .map(|s| s.label().to_string())
                    .collect(),
            });
        }

        store.set_item_status(item_id, from, to, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inferencer::StackInferencer;
    use crate::parser::ParsedTurn;
    use crate::session::{BootstrapSession, Reply};
    use crate::workflow::transition_checked;

    fn server(sequence: QuestionSequence) -> LocalServer {
        LocalServer::new(
            Store::open_in_memory().unwrap(),
            QuestionScript {
                sequence,
                name_hint: Some("acme".to_string()),
                description_hint: Some("A tool".to_string()),
            },
        )
    }

    #[test]
    fn test_conversation_id_is_hex() {
        let id = generate_conversation_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_standard_script_shape() {
        let script = QuestionScript {
            sequence: QuestionSequence::Standard,
            name_hint: Some("acme".to_string()),
            description_hint: Some("   ".to_string()),
        };
        let questions = script.questions();
        assert_eq!(questions.len(), 6);
        assert_eq!(questions[0].prefilled_value.as_deref(), Some("acme"));
        assert_eq!(questions[1].prefilled_value, None);
        assert!(questions[2].content.to_lowercase().contains("backend"));
        let numbers: Vec<_> = questions.iter().map(|q| q.question_number).collect();
        assert_eq!(numbers, (1..=6).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_every_stack_question_has_options() {
        for question in QuestionScript::default().questions().iter().skip(2) {
            let parsed = ParsedTurn::from_turn(question);
            assert!(parsed.has_options(), "{}", question.content);
        }
    }

    #[test]
    fn test_database_question_parses_back_to_choices() {
        let questions = QuestionScript::default().questions();
        let parsed = ParsedTurn::from_turn(&questions[3]);
        let labels: Vec<String> = parsed
            .options
            .unwrap()
            .choices
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, templates::DATABASE_CHOICES);
        assert_eq!(parsed.question, templates::DATABASE_QUESTION);
    }

    #[test]
    fn test_legacy_script_starts_with_backend() {
        let script = QuestionScript {
            sequence: QuestionSequence::Legacy,
            ..Default::default()
        };
        let questions = script.questions();
        assert_eq!(questions.len(), 4);
        assert!(questions[0].content.contains("backend"));
    }

    #[tokio::test]
    async fn test_full_interview_provisions_backlog() {
        let server = server(QuestionSequence::Standard);
        let (id, transcript) = server.start_conversation().unwrap();
        assert_eq!(transcript.len(), 1);

        let mut session =
            BootstrapSession::new(id.clone(), server, transcript, StackInferencer::default());
        assert_eq!(session.prefill(), Some("acme"));

        let answers = [
            "acme-web",
            "Internal dashboard",
            "○ Node.js (Express)",
            "PostgreSQL",
            "Next.js (recommended)",
            "❓ Not sure",
        ];
        let mut last = None;
        for answer in answers {
            last = Some(session.submit(Reply::Text(answer.to_string())).await.unwrap());
        }

        let report = last.unwrap();
        let provisioning = report.provisioning.unwrap();
        assert_eq!(provisioning.created_items.len(), 3);
        assert_eq!(provisioning.skipped_fields, vec!["css"]);
        assert_eq!(provisioning.created_items[0].title, "Set up nodejs backend");

        let server = session.collaborator();
        let project = server.with_store(|s| s.project(&id)).unwrap();
        assert_eq!(project.title, "acme-web");
        assert_eq!(project.description, "Internal dashboard");
        let stack = server.with_store(|s| s.stack(&id)).unwrap().unwrap();
        assert_eq!(stack.frontend.as_deref(), Some("nextjs"));
        assert_eq!(session.transcript().len(), 13);
        assert_eq!(
            session.transcript().last().unwrap().content,
            templates::CLOSING_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_requirements_are_acknowledged() {
        let server = server(QuestionSequence::Legacy);
        let (id, _) = server.start_conversation().unwrap();
        for answer in ["Go", "SQLite", "Svelte", "Sass", "Needs SSO"] {
            server.send_turn(&id, answer, None).await.unwrap();
        }
        let transcript = server.with_store(|s| s.turns(&id)).unwrap();
        assert_eq!(transcript.last().unwrap().content, templates::REQUIREMENT_ACK);
    }

    #[tokio::test]
    async fn test_send_to_unknown_conversation_fails() {
        let server = server(QuestionSequence::Standard);
        let err = server.send_turn("missing", "hi", None).await.unwrap_err();
        assert!(matches!(err, KickoffError::ConversationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_workflow_over_provisioned_items() {
        let server = server(QuestionSequence::Standard);
        let (id, _) = server.start_conversation().unwrap();
        let tokens = StackTokens {
            backend: Some("go".to_string()),
            ..Default::default()
        };
        let result = server.save_stack_configuration(&id, &tokens).await.unwrap();
        let item_id = result.created_items[0].id;

        assert_eq!(
            server.list_valid_transitions(item_id).await.unwrap(),
            vec!["in_progress", "blocked"]
        );
        transition_checked(&server, item_id, "in_progress", Some("picked up"))
            .await
            .unwrap();

        // The server validates too, independent of the client-side check
        let err = server
            .apply_transition(item_id, "done", None)
            .await
            .unwrap_err();
        assert!(matches!(err, KickoffError::InvalidTransition { .. }));
        let err = server
            .apply_transition(item_id, "shipped", None)
            .await
            .unwrap_err();
        assert!(matches!(err, KickoffError::UnknownStatus(_)));

        let history = server.with_store(|s| s.item_history(item_id)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason.as_deref(), Some("picked up"));
    }
}
