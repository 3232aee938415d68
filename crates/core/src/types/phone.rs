//! Vietnamese mobile phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no digits.
    #[error("phone cannot be empty")]
    Empty,
    /// The input has the wrong number of digits.
    #[error("phone must have 10 digits (got {0})")]
    WrongLength(usize),
    /// The input contains something other than digits and separators.
    #[error("phone contains an invalid character: {0:?}")]
    InvalidCharacter(char),
    /// The input does not start with a mobile prefix.
    #[error("phone must start with 0 or +84")]
    BadPrefix,
}

/// A normalized phone number in national format (`0xxxxxxxxx`).
///
/// Parsing accepts the forms commenters and staff actually type: spaces,
/// dots and dashes between groups, and the `+84` / `84` country prefix.
///
/// ## Examples
///
/// ```
/// use liveshop_core::Phone;
///
/// assert_eq!(Phone::parse("0912 345 678").unwrap().as_str(), "0912345678");
/// assert_eq!(Phone::parse("+84 912.345.678").unwrap().as_str(), "0912345678");
/// assert!(Phone::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Number of digits in a national-format number.
    pub const LENGTH: usize = 10;

    /// Parse a `Phone` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input holds anything besides digits, spaces,
    /// `.`, `-`, `(`, `)` and a leading `+`. Also fails when the number of
    /// digits is wrong after normalization or the prefix is not `0`/`84`.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        let international = trimmed.starts_with('+');
        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if let Some(bad) = body
            .chars()
            .find(|c| !c.is_ascii_digit() && !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        {
            return Err(PhoneError::InvalidCharacter(bad));
        }
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        let national = if let Some(rest) = digits.strip_prefix("84")
            && (international || digits.len() == Self::LENGTH + 1)
        {
            format!("0{rest}")
        } else if international {
            return Err(PhoneError::BadPrefix);
        } else {
            digits
        };

        if !national.starts_with('0') {
            return Err(PhoneError::BadPrefix);
        }
        if national.len() != Self::LENGTH {
            return Err(PhoneError::WrongLength(national.len()));
        }

        Ok(Self(national))
    }

    /// Find the first phone number written inside free text.
    ///
    /// Digit runs may be split by single spaces, dots or dashes
    /// ("0912 345 678"). Returns `None` when no run normalizes to a valid
    /// number.
    #[must_use]
    pub fn find_in(text: &str) -> Option<Self> {
        let mut groups: Vec<String> = Vec::new();
        let mut current = String::new();

        for c in text.chars().chain(std::iter::once('\n')) {
            if c.is_ascii_digit() || (c == '+' && current.is_empty() && groups.is_empty()) {
                current.push(c);
            } else if matches!(c, ' ' | '.' | '-') && !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            } else {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                if let Some(phone) = Self::parse_group_suffixes(&groups) {
                    return Some(phone);
                }
                groups.clear();
            }
        }

        None
    }

    /// Try the joined digit groups, dropping leading groups until one parses.
    fn parse_group_suffixes(groups: &[String]) -> Option<Self> {
        (0..groups.len()).find_map(|start| {
            let joined: String = groups.get(start..)?.concat();
            let digit_count = joined.chars().filter(char::is_ascii_digit).count();
            if digit_count < Self::LENGTH {
                return None;
            }
            Self::parse(&joined).ok()
        })
    }

    /// Returns the phone as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(Phone::parse("0912345678").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn test_parse_with_separators() {
        assert_eq!(Phone::parse("091-234-5678").unwrap().as_str(), "0912345678");
        assert_eq!(Phone::parse(" 0912.345.678 ").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn test_parse_country_prefix() {
        assert_eq!(Phone::parse("+84912345678").unwrap().as_str(), "0912345678");
        assert_eq!(Phone::parse("84912345678").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
        assert_eq!(Phone::parse(" - "), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("abc"), Err(PhoneError::InvalidCharacter('a')));
        assert_eq!(Phone::parse("091234"), Err(PhoneError::WrongLength(6)));
        assert_eq!(Phone::parse("1912345678"), Err(PhoneError::BadPrefix));
        assert_eq!(Phone::parse("+1 912345678"), Err(PhoneError::BadPrefix));
    }

    #[test]
    fn test_parse_rejects_letters_and_text() {
        assert_eq!(
            Phone::parse("09abc12345678"),
            Err(PhoneError::InvalidCharacter('a'))
        );
        assert!(Phone::parse("call me 0912345678 pls").is_err());
        assert!(Phone::parse("0912+345678").is_err());
        assert_eq!(Phone::parse("(091) 234-5678").unwrap().as_str(), "0912345678");
    }

    #[test]
    fn test_find_in_comment() {
        let phone = Phone::find_in("A1 x2 sdt 0912 345 678 giao gio hanh chinh").unwrap();
        assert_eq!(phone.as_str(), "0912345678");
    }

    #[test]
    fn test_find_in_ignores_short_runs() {
        assert!(Phone::find_in("A1 x2 B3").is_none());
        assert!(Phone::find_in("chot 2 cai").is_none());
    }

    #[test]
    fn test_find_in_after_other_numbers() {
        let phone = Phone::find_in("A1 2 0912345678").unwrap();
        assert_eq!(phone.as_str(), "0912345678");
    }

    #[test]
    fn test_find_in_international() {
        let phone = Phone::find_in("sdt +84912345678 nha").unwrap();
        assert_eq!(phone.as_str(), "0912345678");
    }
}
