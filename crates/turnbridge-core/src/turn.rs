//! Conversation turns and the append-only turn log.

use serde::{Deserialize, Serialize};

/// One block of program output, optionally followed by a menu of choices.
///
/// A turn is opened by a turn-start marker line and stays mutable until the
/// next marker seals it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Turn {
    /// Body text, continuation lines joined by single spaces.
    pub text: String,

    /// Enumerated choices, in the order they appeared.
    #[serde(default)]
    pub options: Vec<String>,
}

impl Turn {
    /// Create a turn with the given body and no options.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }

    /// Create a turn carrying a menu.
    #[must_use]
    pub fn with_options<I>(text: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a continuation line to the body.
    pub fn push_text(&mut self, line: &str) {
        self.text.push(' ');
        self.text.push_str(line);
    }

    /// Whether this turn offered a menu.
    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Whether the body asks something. Used to tell a real decision
    /// prompt apart from an ordinary bulleted list.
    #[must_use]
    pub fn asks_question(&self) -> bool {
        self.text.contains('?')
    }
}

/// Sealed turns for the lifetime of one parser run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Number of sealed turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been sealed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Sealed turns in completion order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent sealed turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent sealed turn that offered a menu.
    #[must_use]
    pub fn last_with_options(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.has_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_text_joins_with_single_space() {
        let mut turn = Turn::new("Hello");
        turn.push_text("world");
        turn.push_text("again");
        assert_eq!(turn.text, "Hello world again");
    }

    #[test]
    fn test_last_with_options_skips_plain_turns() {
        let mut log = TurnLog::new();
        log.push(Turn::with_options("Pick?", ["A", "B"]));
        log.push(Turn::new("Done."));
        let menu = log.last_with_options().unwrap();
        assert_eq!(menu.options, vec!["A", "B"]);
        assert_eq!(log.last().unwrap().text, "Done.");
    }

    #[test]
    fn test_turn_json_shape() {
        let turn = Turn::with_options("T", ["A", "B"]);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({"text": "T", "options": ["A", "B"]}));
    }
}
