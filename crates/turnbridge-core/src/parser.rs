//! Streaming turn parser.
//!
//! Consumes sanitized transcript lines one at a time and rebuilds the
//! conversation as a sequence of [`Turn`]s. There is no end-of-turn marker in
//! the transcript: a turn is sealed only when the next one starts, so sealed
//! turns surface one turn behind real time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::sanitize::{SanitizedLine, sanitize};
use crate::turn::{Turn, TurnLog};

/// Glyph that opens a new turn.
pub const TURN_MARKER: char = '⏺';

/// Glyph that marks the highlighted entry of an on-screen menu.
pub const OPTION_MARKER: char = '❯';

/// First menu entry, carrying the option glyph.
static MARKED_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^❯\s*(\d+)\.\s*(.*)").unwrap());

/// Any further numbered menu entry.
static NUMBERED_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s*(.*)").unwrap());

/// Instructional lines shown under a menu.
const MENU_HINTS: &[&str] = &["Esc to cancel", "Tab to"];

/// Result of feeding one line to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Blank, noise or separator; nothing changed.
    Skipped,
    /// The in-progress turn or the menu state changed.
    Continued,
    /// A new turn started and the previous one was sealed into the log.
    Sealed(Turn),
}

/// Parser cursor: the in-progress turn and whether a menu is being read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Turn being accumulated, if a marker has been seen.
    pub current: Option<Turn>,
    /// Whether numbered lines are currently read as menu entries.
    pub collecting_options: bool,
}

/// Turn parser state machine. Single owner of the turn log and cursor.
#[derive(Debug, Default)]
pub struct TurnParser {
    log: TurnLog,
    cursor: Cursor,
}

impl TurnParser {
    /// Create a parser with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sealed turns so far.
    #[must_use]
    pub const fn log(&self) -> &TurnLog {
        &self.log
    }

    /// Current cursor state.
    #[must_use]
    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// The in-progress turn, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&Turn> {
        self.cursor.current.as_ref()
    }

    /// Sanitize and feed one raw transcript line.
    pub fn feed_raw(&mut self, raw: &str) -> ParseEvent {
        self.feed(&sanitize(raw))
    }

    /// Feed one sanitized line.
    pub fn feed(&mut self, line: &SanitizedLine) -> ParseEvent {
        match line {
            SanitizedLine::Text(text) => self.feed_text(text),
            SanitizedLine::Blank | SanitizedLine::Noise | SanitizedLine::Separator => {
                ParseEvent::Skipped
            }
        }
    }

    fn feed_text(&mut self, line: &str) -> ParseEvent {
        if let Some(rest) = line.strip_prefix(TURN_MARKER) {
            return self.start_turn(rest.trim());
        }

        if line.starts_with(OPTION_MARKER) {
            let is_menu = self.current().is_some_and(Turn::asks_question);
            self.cursor.collecting_options = is_menu;
            if is_menu {
                if let Some(option) = capture_option(&MARKED_OPTION, line) {
                    self.push_option(option);
                }
            } else {
                tracing::trace!(line, "Option glyph without a question, not a menu");
            }
            return ParseEvent::Continued;
        }

        if self.cursor.collecting_options {
            if let Some(option) = capture_option(&NUMBERED_OPTION, line) {
                self.push_option(option);
                return ParseEvent::Continued;
            }
            if line.starts_with('(') || MENU_HINTS.iter().any(|h| line.contains(h)) {
                return ParseEvent::Skipped;
            }
            self.cursor.collecting_options = false;
        }

        if let Some(turn) = self.cursor.current.as_mut() {
            turn.push_text(line);
        }
        ParseEvent::Continued
    }

    fn start_turn(&mut self, text: &str) -> ParseEvent {
        let previous = self.cursor.current.replace(Turn::new(text));
        self.cursor.collecting_options = false;
        tracing::debug!(text, "Turn started");

        match previous {
            Some(turn) => {
                self.log.push(turn.clone());
                ParseEvent::Sealed(turn)
            }
            None => ParseEvent::Continued,
        }
    }

    fn push_option(&mut self, option: String) {
        if let Some(turn) = self.cursor.current.as_mut() {
            tracing::debug!(index = turn.options.len() + 1, option = %option, "Option captured");
            turn.options.push(option);
        }
    }

    /// Sealed turns followed by the in-progress one, for mirroring.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            sealed: self.log.turns(),
            current: self.current(),
        }
    }
}

/// Borrowed view of the whole conversation, serialized as one JSON array.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    sealed: &'a [Turn],
    current: Option<&'a Turn>,
}

impl Snapshot<'_> {
    /// Number of turns in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sealed.len() + usize::from(self.current.is_some())
    }

    /// Whether the view holds no turn at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sealed.iter().chain(self.current))
    }
}

/// Option text of a numbered entry, unless it is only a parenthetical hint.
fn capture_option(pattern: &Regex, line: &str) -> Option<String> {
    let caps = pattern.captures(line)?;
    let text = caps.get(2).map_or("", |m| m.as_str()).trim();
    if text.starts_with('(') && text.ends_with(')') {
        None
    } else {
        Some(text.to_string())
    }
}
