//! Session codes ("A1", "B12") and claim extraction from comment text.
//!
//! During a live, each product on screen is announced with a short session
//! code. Viewers claim a product by commenting that code, optionally followed
//! by a quantity: `A1`, `a1 x2`, `B3*3`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`SessionIndex`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionIndexError {
    /// The input is empty.
    #[error("session index cannot be empty")]
    Empty,
    /// The input does not look like letters followed by digits.
    #[error("session index must be 1-2 letters followed by 1-3 digits: {0}")]
    Malformed(String),
}

/// A normalized (upper-cased) session code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct SessionIndex(String);

const MAX_LETTERS: usize = 2;
const MAX_DIGITS: usize = 3;
const MAX_CLAIM_QUANTITY: i32 = 99;

impl SessionIndex {
    /// Parse a session code, ignoring surrounding whitespace and case.
    ///
    /// # Errors
    ///
    /// Returns `SessionIndexError::Empty` for blank input and
    /// `SessionIndexError::Malformed` when the shape is wrong.
    pub fn parse(s: &str) -> Result<Self, SessionIndexError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SessionIndexError::Empty);
        }

        let letters = trimmed
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .count();
        let digits = trimmed.get(letters..).unwrap_or_default();

        let valid = (1..=MAX_LETTERS).contains(&letters)
            && (1..=MAX_DIGITS).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit());

        if !valid {
            return Err(SessionIndexError::Malformed(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionIndex {
    type Error = SessionIndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionIndex> for String {
    fn from(index: SessionIndex) -> Self {
        index.0
    }
}

/// A product claim found in a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// The claimed code.
    pub index: SessionIndex,
    /// Units claimed (at least 1).
    pub quantity: i32,
}

/// Extract every session-code claim from a comment.
///
/// Codes must stand alone: "A1" inside "TA12B" is ignored. A quantity written
/// as `x2`, `X2` or `*2` may follow, glued or after whitespace. Repeated codes
/// are merged by summing quantities, in first-seen order.
#[must_use]
pub fn extract_claims(message: &str) -> Vec<Claim> {
    let chars: Vec<char> = message.chars().collect();
    let mut claims: Vec<Claim> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let starts_token = i == 0 || chars.get(i - 1).is_some_and(|c| !c.is_alphanumeric());
        if !starts_token || !chars.get(i).is_some_and(char::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let letters_end = scan(&chars, i, char::is_ascii_alphabetic);
        let digits_end = scan(&chars, letters_end, char::is_ascii_digit);
        let letter_count = letters_end - i;
        let digit_count = digits_end - letters_end;

        // A digit run followed by another letter belongs to a longer word,
        // unless the letter opens a glued quantity such as `x2`.
        let ends_token = match chars.get(digits_end) {
            None => true,
            Some(c) if c.is_alphabetic() && is_quantity_marker(*c) => {
                glued_quantity_ends(&chars, digits_end + 1)
            }
            Some(c) => !c.is_alphanumeric(),
        };

        if !(1..=MAX_LETTERS).contains(&letter_count)
            || !(1..=MAX_DIGITS).contains(&digit_count)
            || !ends_token
        {
            i = digits_end.max(letters_end).max(i + 1);
            continue;
        }

        let code: String = chars.get(i..digits_end).unwrap_or_default().iter().collect();
        let Ok(index) = SessionIndex::parse(&code) else {
            i = digits_end;
            continue;
        };

        let (quantity, next) = parse_quantity(&chars, digits_end);
        merge_claim(&mut claims, index, quantity);
        i = next;
    }

    claims
}

fn scan(chars: &[char], from: usize, pred: impl Fn(&char) -> bool) -> usize {
    let mut end = from;
    while chars.get(end).is_some_and(&pred) {
        end += 1;
    }
    end
}

const fn is_quantity_marker(c: char) -> bool {
    matches!(c, 'x' | 'X' | '*')
}

/// Whether `from` starts a digit run that closes the token: `x2` in `A1x2`
/// but not `xanh` in `A1xanh` or `x2B` in `A1x2B`.
fn glued_quantity_ends(chars: &[char], from: usize) -> bool {
    let digits_end = scan(chars, from, char::is_ascii_digit);
    digits_end > from && chars.get(digits_end).is_none_or(|c| !c.is_alphanumeric())
}

/// Parse an optional `x2` / `*2` quantity starting at `from`.
///
/// Returns the quantity (1 when absent or invalid) and the index to resume
/// scanning from.
fn parse_quantity(chars: &[char], from: usize) -> (i32, usize) {
    let marker_at = scan(chars, from, |c| *c == ' ');
    if !chars.get(marker_at).is_some_and(|c| is_quantity_marker(*c)) {
        return (1, from);
    }

    let digits_start = marker_at + 1;
    let digits_end = scan(chars, digits_start, char::is_ascii_digit);
    let followed_by_word = chars.get(digits_end).is_some_and(|c| c.is_alphabetic());
    if digits_end == digits_start || followed_by_word {
        return (1, from);
    }

    let digits: String = chars
        .get(digits_start..digits_end)
        .unwrap_or_default()
        .iter()
        .collect();
    match digits.parse::<i32>() {
        Ok(quantity) if (1..=MAX_CLAIM_QUANTITY).contains(&quantity) => (quantity, digits_end),
        _ => (1, digits_end),
    }
}

fn merge_claim(claims: &mut Vec<Claim>, index: SessionIndex, quantity: i32) {
    if let Some(existing) = claims.iter_mut().find(|c| c.index == index) {
        existing.quantity += quantity;
    } else {
        claims.push(Claim { index, quantity });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn codes(message: &str) -> Vec<(String, i32)> {
        extract_claims(message)
            .into_iter()
            .map(|c| (c.index.to_string(), c.quantity))
            .collect()
    }

    #[test]
    fn test_parse_normalizes_case() {
        assert_eq!(SessionIndex::parse(" a1 ").unwrap().as_str(), "A1");
        assert_eq!(SessionIndex::parse("Bc123").unwrap().as_str(), "BC123");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(SessionIndex::parse(""), Err(SessionIndexError::Empty));
        assert!(SessionIndex::parse("A").is_err());
        assert!(SessionIndex::parse("12").is_err());
        assert!(SessionIndex::parse("ABC1").is_err());
        assert!(SessionIndex::parse("A1234").is_err());
        assert!(SessionIndex::parse("A1B").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: Result<SessionIndex, _> = serde_json::from_str("\"c7\"");
        assert_eq!(ok.unwrap().as_str(), "C7");
        let bad: Result<SessionIndex, _> = serde_json::from_str("\"hello\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_extract_single_code() {
        assert_eq!(codes("A1"), vec![("A1".to_string(), 1)]);
        assert_eq!(codes("chot a1 nha shop"), vec![("A1".to_string(), 1)]);
    }

    #[test]
    fn test_extract_quantities() {
        assert_eq!(codes("A1 x2"), vec![("A1".to_string(), 2)]);
        assert_eq!(codes("a1x3"), vec![("A1".to_string(), 3)]);
        assert_eq!(codes("B2*4, C3"), vec![("B2".to_string(), 4), ("C3".to_string(), 1)]);
    }

    #[test]
    fn test_extract_merges_repeats() {
        assert_eq!(codes("A1 A1 x2"), vec![("A1".to_string(), 3)]);
    }

    #[test]
    fn test_extract_ignores_embedded_codes() {
        assert!(codes("TA12B").is_empty());
        assert!(codes("size M12cm").is_empty());
        assert!(codes("sdt 0912345678").is_empty());
        assert!(codes("A1xanh").is_empty());
        assert!(codes("B2XL").is_empty());
        assert!(codes("A1x2B").is_empty());
        assert!(codes("A1vang").is_empty());
    }

    #[test]
    fn test_extract_ignores_words() {
        assert!(codes("dep qua shop oi").is_empty());
        assert!(codes("ABC1").is_empty());
    }

    #[test]
    fn test_extract_quantity_out_of_range_defaults_to_one() {
        assert_eq!(codes("A1 x0"), vec![("A1".to_string(), 1)]);
        assert_eq!(codes("A1 x500"), vec![("A1".to_string(), 1)]);
        assert_eq!(codes("A1x500"), vec![("A1".to_string(), 1)]);
        assert_eq!(codes("A1*"), vec![("A1".to_string(), 1)]);
    }

    #[test]
    fn test_extract_x_word_is_not_quantity() {
        assert_eq!(codes("A1 xinh qua"), vec![("A1".to_string(), 1)]);
    }
}
