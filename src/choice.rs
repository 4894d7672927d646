//! Selection rules for choice questions.

use tracing::debug;

use crate::error::KickoffError;
use crate::model::{ChoiceKind, ChoiceOptions};

/// A submitted choice answer, ready to be sent as a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceAnswer {
    /// Selected labels joined by `", "` in selection order.
    pub content: String,
    pub selected_option_ids: Vec<String>,
}

/// Accumulates the user's selection for one choice question.
#[derive(Debug, Clone)]
pub struct ChoiceSelection {
    options: ChoiceOptions,
    /// Selected ids in the order they were picked.
    selected: Vec<String>,
}

impl ChoiceSelection {
    pub fn new(options: ChoiceOptions) -> Self {
        Self {
            options,
            selected: Vec::new(),
        }
    }

    /// Toggles an option. Single-choice questions keep at most one id:
    /// picking another replaces it, picking the same one clears it.
    /// Returns false for ids that are not part of the question.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.options.find(id).is_none() {
            debug!(id, "choice_toggle_unknown_id");
            return false;
        }

        if self.is_selected(id) {
            self.selected.retain(|s| s != id);
            return true;
        }

        if self.options.kind == ChoiceKind::Single {
            self.selected.clear();
        }
        self.selected.push(id.to_string());
        true
    }

    /// Toggles the option at a 1-based position, as typed in the terminal.
    pub fn select_ordinal(&mut self, ordinal: usize) -> bool {
        let id = match ordinal
            .checked_sub(1)
            .and_then(|i| self.options.choices.get(i))
        {
            Some(choice) => choice.id.clone(),
            None => return false,
        };
        self.toggle(&id)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    /// Single questions take exactly one id, multiple questions at least one.
    pub fn can_submit(&self) -> bool {
        match self.options.kind {
            ChoiceKind::Single => self.selected.len() == 1,
            ChoiceKind::Multiple => !self.selected.is_empty(),
        }
    }

    /// Labels for the selected ids, in selection order.
    pub fn selected_labels(&self) -> Vec<&str> {
        self.selected
            .iter()
            .filter_map(|id| self.options.find(id))
            .map(|c| c.label.as_str())
            .collect()
    }

    pub fn submit(&self) -> Result<ChoiceAnswer, KickoffError> {
        if !self.can_submit() {
            return Err(KickoffError::EmptySelection);
        }

        Ok(ChoiceAnswer {
            content: self.selected_labels().join(", "),
            selected_option_ids: self.selected.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn options(text: &str) -> ChoiceOptions {
        parse(text).options.unwrap()
    }

    #[test]
    fn test_single_choice_replaces_selection() {
        let mut sel = ChoiceSelection::new(options("Q\n○ A\n○ B\n○ C"));
        assert!(sel.toggle("opt-0"));
        assert!(sel.toggle("opt-2"));
        assert_eq!(sel.selected_ids(), ["opt-2"]);
        assert!(!sel.is_selected("opt-0"));
    }

    #[test]
    fn test_single_choice_toggle_same_clears() {
        let mut sel = ChoiceSelection::new(options("Q\n○ A\n○ B"));
        sel.toggle("opt-1");
        sel.toggle("opt-1");
        assert!(sel.selected_ids().is_empty());
        assert!(!sel.can_submit());
    }

    #[test]
    fn test_multiple_choice_accumulates_in_pick_order() {
        let mut sel = ChoiceSelection::new(options("Q\n☐ A\n☐ B\n☐ C"));
        sel.toggle("opt-2");
        sel.toggle("opt-0");
        sel.toggle("opt-1");
        sel.toggle("opt-1");
        assert_eq!(sel.selected_ids(), ["opt-2", "opt-0"]);
        assert_eq!(sel.selected_labels(), vec!["C", "A"]);
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let mut sel = ChoiceSelection::new(options("Q\n○ A"));
        assert!(!sel.toggle("opt-9"));
        assert!(!sel.toggle("A"));
        assert!(sel.selected_ids().is_empty());
    }

    #[test]
    fn test_select_ordinal() {
        let mut sel = ChoiceSelection::new(options("Q\n☐ A\n☐ B"));
        assert!(sel.select_ordinal(2));
        assert!(!sel.select_ordinal(0));
        assert!(!sel.select_ordinal(3));
        assert_eq!(sel.selected_ids(), ["opt-1"]);
    }

    #[test]
    fn test_submit_requires_selection() {
        let sel = ChoiceSelection::new(options("Q\n☐ A"));
        assert!(matches!(sel.submit(), Err(KickoffError::EmptySelection)));
    }

    #[test]
    fn test_submit_sends_labels() {
        let mut sel = ChoiceSelection::new(options("Q\n☐ Auth\n☐ Billing\n☐ Search"));
        sel.toggle("opt-2");
        sel.toggle("opt-0");
        let answer = sel.submit().unwrap();
        assert_eq!(answer.content, "Search, Auth");
        assert_eq!(answer.selected_option_ids, vec!["opt-2", "opt-0"]);
    }
}
