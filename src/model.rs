//! Conversation data model shared by the parser, reconciler and inferencer.
//!
//! Field names follow the REST payloads (`snake_case`), with `camelCase`
//! aliases so transcripts exported from the web client load unchanged.

use serde::{Deserialize, Serialize};

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// Whether a choice question accepts one or several selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceKind {
    Single,
    Multiple,
}

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Positional id (`opt-<index>`), stable across re-parses of the same text.
    pub id: String,
    /// Human text sent back to the server.
    pub label: String,
    /// Slug for logs only.
    pub value: String,
}

/// Structured choice payload, either parsed or supplied by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOptions {
    pub kind: ChoiceKind,
    pub choices: Vec<Choice>,
}

impl ChoiceOptions {
    pub fn find(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// One message in a transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChoiceOptions>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "prefilledValue"
    )]
    pub prefilled_value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "questionNumber"
    )]
    pub question_number: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "selectedOptionIds"
    )]
    pub selected_option_ids: Option<Vec<String>>,
}

impl Turn {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            options: None,
            prefilled_value: None,
            question_number: None,
            selected_option_ids: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn with_question_number(mut self, number: u32) -> Self {
        self.question_number = Some(number);
        self
    }

    pub fn with_prefill(mut self, value: impl Into<String>) -> Self {
        self.prefilled_value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: ChoiceOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_selected_ids(mut self, ids: Vec<String>) -> Self {
        self.selected_option_ids = Some(ids);
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Project metadata fields that a prefilled answer can update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectField {
    Title,
    Description,
}

impl ProjectField {
    /// Fixed question 1 is the project name, 2 the description. Anything else
    /// maps to no field.
    pub fn for_question(question_number: u32) -> Option<Self> {
        match question_number {
            1 => Some(ProjectField::Title),
            2 => Some(ProjectField::Description),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectField::Title => "title",
            ProjectField::Description => "description",
        }
    }
}

/// Normalized technology tokens extracted from the stack answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTokens {
    pub backend: Option<String>,
    pub database: Option<String>,
    pub frontend: Option<String>,
    pub css: Option<String>,
}

impl StackTokens {
    /// Pairs of (field name, token) in question order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("backend", self.backend.as_deref()),
            ("database", self.database.as_deref()),
            ("frontend", self.frontend.as_deref()),
            ("css", self.css.as_deref()),
        ]
    }
}

/// A backlog item as returned by the workflow collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: i64,
    pub title: String,
    pub status: String,
}

/// What the collaborator did with a saved stack configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    /// Backlog items created for the known stack tokens.
    pub created_items: Vec<BacklogItem>,
    /// Stack fields that were unknown and got no item.
    pub skipped_fields: Vec<String>,
}
