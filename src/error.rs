//! Typed errors for the bootstrap engine and its collaborators.
//!
//! `main` propagates with `anyhow`; everything below the CLI edge returns
//! these so callers can tell a failed send apart from a rejected selection.

use std::path::PathBuf;

/// Errors surfaced by the engine, the local store, and the collaborators.
#[derive(Debug, thiserror::Error)]
pub enum KickoffError {
    /// A choice answer was submitted with nothing selected.
    #[error("Select at least one option before submitting")]
    EmptySelection,

    /// Conversation id not known to the collaborator.
    #[error("Conversation '{conversation_id}' not found")]
    ConversationNotFound { conversation_id: String },

    /// Backlog item id not known to the workflow collaborator.
    #[error("Backlog item {item_id} not found")]
    ItemNotFound { item_id: i64 },

    /// Requested status is not reachable from the item's current status.
    #[error("Cannot move item {item_id} to {to}. Allowed: {}", allowed.join(", "))]
    InvalidTransition {
        item_id: i64,
        to: String,
        allowed: Vec<String>,
    },

    /// Status name that is not part of the backlog workflow.
    #[error("Unknown status '{0}'")]
    UnknownStatus(String),

    /// Transcript file could not be read or decoded.
    #[error("Failed to read transcript at {}: {detail}", path.display())]
    TranscriptRead { path: PathBuf, detail: String },

    /// The directory holding the local database could not be created.
    #[error("Failed to create data directory {}: {detail}", path.display())]
    DataDir { path: PathBuf, detail: String },

    /// Underlying SQLite failure in the local store.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON encoding of a stored column failed.
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Any other collaborator failure (network, server-side validation).
    #[error("{0}")]
    Collaborator(String),
}
