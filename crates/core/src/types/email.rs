//! Contact email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a contact email was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// Nothing was entered.
    #[error("email is required")]
    Missing,
    /// Longer than the SMTP path limit.
    #[error("email is longer than {} characters", Email::MAX_LENGTH)]
    TooLong,
    /// Not shaped like `name@host.tld`.
    #[error("email is not a valid address: {0}")]
    Malformed(&'static str),
}

/// A shopper's contact email, as attached to a cart at checkout.
///
/// Input comes from a form field, so surrounding whitespace is dropped and
/// the host is lowercased. Only the shape is checked; deliverability is the
/// backend's concern.
///
/// ```
/// use medusa_store_core::Email;
///
/// let email = Email::parse("  Ada@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "Ada@example.com");
///
/// assert!(Email::parse("ada@localhost").is_err());
/// assert!(Email::parse("ada lovelace@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum address length (RFC 5321 path limit minus the brackets).
    pub const MAX_LENGTH: usize = 254;

    /// Validate and normalize a contact email.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] describing the first problem found.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EmailError::Missing);
        }
        if input.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(EmailError::Malformed("contains whitespace"));
        }

        let (mailbox, host) = input
            .rsplit_once('@')
            .ok_or(EmailError::Malformed("missing @"))?;
        if mailbox.is_empty() {
            return Err(EmailError::Malformed("nothing before @"));
        }

        let host = host.to_ascii_lowercase();
        let labels_ok = host.split('.').all(|label| !label.is_empty());
        if !host.contains('.') || !labels_ok {
            return Err(EmailError::Malformed("host needs a domain like example.com"));
        }

        Ok(Self(format!("{mailbox}@{host}")))
    }

    /// The normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        for input in ["ada@example.com", "ada+orders@shop.example.co.uk", "a.b@c.io"] {
            assert_eq!(Email::parse(input).unwrap().as_str(), input);
        }
    }

    #[test]
    fn test_normalizes_form_input() {
        let email = Email::parse("\tAda.Lovelace@EXAMPLE.com \n").unwrap();
        assert_eq!(email.to_string(), "Ada.Lovelace@example.com");
    }

    #[test]
    fn test_rejects_blank_input() {
        assert_eq!(Email::parse(""), Err(EmailError::Missing));
        assert_eq!(Email::parse("   "), Err(EmailError::Missing));
    }

    #[test]
    fn test_rejects_overlong_input() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_rejects_malformed_input() {
        for input in [
            "ada",
            "@example.com",
            "ada@",
            "ada@localhost",
            "ada@example.",
            "ada@.com",
            "ada lovelace@example.com",
        ] {
            assert!(
                matches!(Email::parse(input), Err(EmailError::Malformed(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let email = Email::parse("ada@example.com").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"ada@example.com\"");
    }
}
