//! Backlog workflow: statuses, the transition graph, and the collaborator seam.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::KickoffError;

/// Status of a backlog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BacklogStatus {
    Todo,
    InProgress,
    Review,
    Blocked,
    Done,
}

impl BacklogStatus {
    pub const ALL: [BacklogStatus; 5] = [
        Self::Todo,
        Self::InProgress,
        Self::Review,
        Self::Blocked,
        Self::Done,
    ];

    /// Parse status from its stored name.
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|status| status.label() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    /// Statuses reachable in one step. `Done` is terminal.
    pub fn allowed_targets(&self) -> &'static [BacklogStatus] {
        match self {
            Self::Todo => &[Self::InProgress, Self::Blocked],
            Self::InProgress => &[Self::Review, Self::Blocked, Self::Todo],
            Self::Review => &[Self::Done, Self::InProgress],
            Self::Blocked => &[Self::Todo, Self::InProgress],
            Self::Done => &[],
        }
    }

    pub fn can_transition_to(&self, target: BacklogStatus) -> bool {
        self.allowed_targets().contains(&target)
    }
}

/// Server-side workflow for backlog items. The server owns validation;
/// clients only see the allow-list and ask for a move.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn list_valid_transitions(&self, item_id: i64) -> Result<Vec<String>, KickoffError>;

    async fn apply_transition(
        &self,
        item_id: i64,
        to_status: &str,
        reason: Option<&str>,
    ) -> Result<(), KickoffError>;
}

/// Moves an item after checking the server's allow-list, so an invalid
/// target is reported with the allowed alternatives instead of a bare
/// server rejection.
pub async fn transition_checked<W: WorkflowService + ?Sized>(
    service: &W,
    item_id: i64,
    to_status: &str,
    reason: Option<&str>,
) -> Result<(), KickoffError> {
    let allowed = service.list_valid_transitions(item_id).await?;

    if !allowed.iter().any(|s| s == to_status) {
        warn!(item_id, to_status, ?allowed, "transition_not_allowed");
        return Err(KickoffError::InvalidTransition {
            item_id,
            to: to_status.to_string(),
            allowed,
        });
    }

    service.apply_transition(item_id, to_status, reason).await?;
    info!(item_id, to_status, "transition_applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_status_label_roundtrip() {
        for status in BacklogStatus::ALL {
            assert_eq!(BacklogStatus::from_str(status.label()), Some(status));
        }
    }

    #[test]
    fn test_status_from_str_invalid() {
        assert_eq!(BacklogStatus::from_str("Done"), None); // case sensitive
        assert_eq!(BacklogStatus::from_str("in progress"), None);
        assert_eq!(BacklogStatus::from_str(""), None);
        assert_eq!(BacklogStatus::from_str(" done "), Some(BacklogStatus::Done));
    }

    #[test]
    fn test_done_is_terminal() {
        for status in BacklogStatus::ALL {
            assert!(!BacklogStatus::Done.can_transition_to(status));
        }
    }

    #[test]
    fn test_graph_has_no_self_loops() {
        for status in BacklogStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_every_status_reaches_done() {
        for start in BacklogStatus::ALL {
            let mut seen = vec![start];
            let mut frontier = vec![start];
            while let Some(s) = frontier.pop() {
                for next in s.allowed_targets() {
                    if !seen.contains(next) {
                        seen.push(*next);
                        frontier.push(*next);
                    }
                }
            }
            assert!(seen.contains(&BacklogStatus::Done), "{:?}", start);
        }
    }

    /// In-memory workflow that records applied moves.
    struct FakeWorkflow {
        status: Mutex<BacklogStatus>,
        applied: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl WorkflowService for FakeWorkflow {
        async fn list_valid_transitions(&self, _item_id: i64) -> Result<Vec<String>, KickoffError> {
            let status = *self.status.lock().unwrap();
            Ok(status
                .allowed_targets()
                .iter()
                .map(|s| s.label().to_string())
                .collect())
        }

        async fn apply_transition(
            &self,
            _item_id: i64,
            to_status: &str,
            reason: Option<&str>,
        ) -> Result<(), KickoffError> {
            let target = BacklogStatus::from_str(to_status)
                .ok_or_else(|| KickoffError::UnknownStatus(to_status.to_string()))?;
            *self.status.lock().unwrap() = target;
            self.applied
                .lock()
                .unwrap()
                .push((to_status.to_string(), reason.map(str::to_string)));
            Ok(())
        }
    }

    fn fake() -> FakeWorkflow {
        FakeWorkflow {
            status: Mutex::new(BacklogStatus::Todo),
            applied: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_transition_checked_applies_allowed_move() {
        let wf = fake();
        transition_checked(&wf, 1, "in_progress", Some("starting"))
            .await
            .unwrap();
        assert_eq!(*wf.status.lock().unwrap(), BacklogStatus::InProgress);
        assert_eq!(
            wf.applied.lock().unwrap().as_slice(),
            &[("in_progress".to_string(), Some("starting".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_transition_checked_rejects_disallowed_move() {
        let wf = fake();
        let err = transition_checked(&wf, 7, "done", None).await.unwrap_err();
        match err {
            KickoffError::InvalidTransition { item_id, allowed, .. } => {
                assert_eq!(item_id, 7);
                assert_eq!(allowed, vec!["in_progress", "blocked"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(wf.applied.lock().unwrap().is_empty());
    }
}
