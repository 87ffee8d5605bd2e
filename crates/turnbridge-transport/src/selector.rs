//! Menu selector parsing.

use thiserror::Error;

/// Spelled-out numbers accepted as selectors, indexed by value.
pub const SPELLED_NUMBERS: [&str; 11] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Not an option number: {0:?}")]
pub struct SelectorError(pub String);

/// Parse a selector: a non-negative integer or a spelled number from zero to ten.
///
/// # Errors
/// Returns [`SelectorError`] for anything else.
pub fn parse_selector(input: &str) -> Result<u32, SelectorError> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse()
            .map_err(|_| SelectorError(input.to_string()));
    }

    let lowered = trimmed.to_lowercase();
    SPELLED_NUMBERS
        .iter()
        .position(|word| *word == lowered)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| SelectorError(input.to_string()))
}
