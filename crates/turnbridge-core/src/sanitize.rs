//! Line sanitizer: strips terminal control sequences and classifies UI noise.

use once_cell::sync::Lazy;
use regex::Regex;

/// CSI sequences (`ESC [ params intermediates final`) and two-character escapes.
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

/// Prefixes of tool banners and status glyphs that never carry turn content.
/// The option glyph is deliberately absent.
pub const IGNORED_PREFIXES: &[&str] = &["WRITE", "READ", "✽", "g)"];

/// Substrings marking spinner, keyboard-hint and leftover control text.
pub const NOISE_SUBSTRINGS: &[&str] = &[
    "esc to interrupt",
    "? for shortcuts",
    "ctrl+r to expand",
    "\u{7}",
    "\u{1b}",
    "[?25l",
    "[?25h",
    "[?2004",
];

/// Box-drawing characters that make up horizontal rules.
pub const SEPARATOR_CHARS: &[char] = &['─', '╌'];

/// Classification of one transcript line after cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizedLine {
    /// Nothing left after stripping.
    Blank,
    /// Known UI chatter; dropped before the parser sees it.
    Noise,
    /// A horizontal rule. Skipped by the parser without touching its state.
    Separator,
    /// Plain text content.
    Text(String),
}

impl SanitizedLine {
    /// The text content, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Remove escape sequences and surrounding whitespace.
#[must_use]
pub fn strip_ansi(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").trim().to_string()
}

/// Whether a cleaned line is made of a single separator character, repeated.
#[must_use]
pub fn is_separator(line: &str) -> bool {
    !line.is_empty()
        && SEPARATOR_CHARS
            .iter()
            .any(|sep| line.chars().all(|c| c == *sep))
}

/// Whether a cleaned line is UI noise.
#[must_use]
pub fn is_noise(line: &str) -> bool {
    IGNORED_PREFIXES.iter().any(|p| line.starts_with(p))
        || NOISE_SUBSTRINGS.iter().any(|s| line.contains(s))
}

/// Clean and classify one raw transcript line.
#[must_use]
pub fn sanitize(raw: &str) -> SanitizedLine {
    let line = strip_ansi(raw);
    if line.is_empty() {
        SanitizedLine::Blank
    } else if is_noise(&line) {
        SanitizedLine::Noise
    } else if is_separator(&line) {
        SanitizedLine::Separator
    } else {
        SanitizedLine::Text(line)
    }
}
