//! Money in minor currency units.
//!
//! The commerce backend reports every amount (unit prices, line totals, cart
//! totals, shipping option prices) as an integer count of minor units in the
//! cart's region currency. [`Money`] pairs that integer with its currency so it
//! can be formatted for display the way the storefront always has:
//! en-US grouping with the currency symbol in front (`$1,234.50`).

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount in minor units with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the smallest currency unit (e.g., cents for USD).
    pub amount: i64,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// The amount in major units (e.g., dollars), exact.
    #[must_use]
    pub fn major_units(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.amount), 2)
    }

    /// Format for display (e.g., `$19.99`, `-€5.00`, `CA$1,000.00`).
    #[must_use]
    pub fn display(&self) -> String {
        let major = self.major_units();
        let sign = if major.is_sign_negative() && !major.is_zero() {
            "-"
        } else {
            ""
        };
        let digits = major.abs().to_string();
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

        format!(
            "{sign}{}{}.{fraction}",
            self.currency_code.symbol(),
            group_thousands(whole)
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Insert `,` separators every three digits from the right.
fn group_thousands(whole: &str) -> String {
    let len = whole.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// ISO 4217 currency codes.
///
/// The backend sends lowercase codes (`"usd"`); parsing is case-insensitive
/// and serialization always produces the lowercase wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    /// Any other three-letter code, stored upper-case.
    Other(String),
}

impl CurrencyCode {
    /// Upper-case ISO code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::Other(code) => code,
        }
    }

    /// Display prefix used by en-US currency formatting.
    #[must_use]
    pub fn symbol(&self) -> String {
        match self {
            Self::USD => "$".to_string(),
            Self::EUR => "€".to_string(),
            Self::GBP => "£".to_string(),
            Self::CAD => "CA$".to_string(),
            Self::AUD => "A$".to_string(),
            Self::Other(code) => format!("{code}\u{a0}"),
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            code if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                Ok(Self::Other(upper))
            }
            _ => Err(format!("invalid currency code: {s}")),
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.code().to_ascii_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_usd() {
        assert_eq!(Money::new(1999, CurrencyCode::USD).display(), "$19.99");
        assert_eq!(Money::new(0, CurrencyCode::USD).display(), "$0.00");
        assert_eq!(Money::new(5, CurrencyCode::USD).display(), "$0.05");
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::new(123_450, CurrencyCode::EUR).display(), "€1,234.50");
        assert_eq!(
            Money::new(100_000_000, CurrencyCode::GBP).display(),
            "£1,000,000.00"
        );
    }

    #[test]
    fn test_display_negative() {
        assert_eq!(Money::new(-500, CurrencyCode::CAD).display(), "-CA$5.00");
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(
            "jpy".parse::<CurrencyCode>().unwrap(),
            CurrencyCode::Other("JPY".to_string())
        );
        assert!("dollars".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_serde_uses_lowercase_wire_form() {
        let json = serde_json::to_string(&CurrencyCode::EUR).unwrap();
        assert_eq!(json, "\"eur\"");
        let parsed: CurrencyCode = serde_json::from_str("\"aud\"").unwrap();
        assert_eq!(parsed, CurrencyCode::AUD);
    }
}
