//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain an @ symbol.
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty.
    #[error("email domain cannot be empty")]
    EmptyDomain,
    /// The input contains whitespace.
    #[error("email cannot contain whitespace")]
    ContainsWhitespace,
}

/// A structurally valid email address.
///
/// The identity provider is the authority on whether an address actually
/// belongs to an account; this type only guarantees the address is shaped
/// like one before it crosses a network boundary.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Contains an @ with a non-empty local part and domain
/// - No whitespace anywhere
///
/// ## Examples
///
/// ```
/// use crypted_core::Email;
///
/// assert!(Email::parse("ops@crypted.app").is_ok());
/// assert!(Email::parse("first.last+staff@crypted.app").is_ok());
///
/// assert!(Email::parse("").is_err());            // empty
/// assert!(Email::parse("not-an-address").is_err()); // missing @
/// assert!(Email::parse("@crypted.app").is_err());   // empty local part
/// assert!(Email::parse("ops@").is_err());           // empty domain
/// assert!(Email::parse("o ps@crypted.app").is_err()); // whitespace
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 254 characters,
    /// contains whitespace, is missing an @ symbol, or has an empty local
    /// part or domain.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::ContainsWhitespace);
        }

        let at_pos = s.find('@').ok_or(EmailError::MissingAtSymbol)?;

        if at_pos == 0 {
            return Err(EmailError::EmptyLocalPart);
        }

        if at_pos == s.len() - 1 {
            return Err(EmailError::EmptyDomain);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        let email = Email::parse("mod@crypted.app").expect("valid");
        assert_eq!(email.as_str(), "mod@crypted.app");
    }

    #[test]
    fn accepts_subaddressing() {
        assert!(Email::parse("mod+reports@crypted.app").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Email::parse(""), Err(EmailError::Empty)));
    }

    #[test]
    fn rejects_missing_at() {
        assert!(matches!(
            Email::parse("crypted.app"),
            Err(EmailError::MissingAtSymbol)
        ));
    }

    #[test]
    fn rejects_empty_local_part() {
        assert!(matches!(
            Email::parse("@crypted.app"),
            Err(EmailError::EmptyLocalPart)
        ));
    }

    #[test]
    fn rejects_empty_domain() {
        assert!(matches!(Email::parse("mod@"), Err(EmailError::EmptyDomain)));
    }

    #[test]
    fn rejects_whitespace() {
        assert!(matches!(
            Email::parse("m od@crypted.app"),
            Err(EmailError::ContainsWhitespace)
        ));
    }

    #[test]
    fn rejects_overlong_input() {
        let long = format!("{}@crypted.app", "a".repeat(260));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        ));
    }

    #[test]
    fn serde_is_transparent() {
        let email = Email::parse("mod@crypted.app").expect("valid");
        let json = serde_json::to_string(&email).expect("serialize");
        assert_eq!(json, "\"mod@crypted.app\"");
    }
}
