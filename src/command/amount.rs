//! Monetary amounts in integer cents

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A money amount stored as integer cents
///
/// Displays and serializes as a two-place decimal string (`"4.50"`) so no
/// float rounding ever reaches storage. Deserializes from either a JSON
/// number or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Parse a decimal string such as `4.5`, `$1,200.00` or `-3.25`
    ///
    /// A third fractional digit rounds half up; anything else non-numeric
    /// yields `None`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | ' '))
            .collect();

        let (negative, digits) = cleaned
            .strip_prefix('-')
            .map_or((false, cleaned.as_str()), |rest| (true, rest));

        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

        let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().is_some_and(|d| d >= 5);

        let cents = whole_value
            .checked_mul(100)?
            .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;

        Some(Self(if negative { -cents } else { cents }))
    }

    /// Convert a float amount, rounding to the nearest cent
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as number or string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::parse(v).ok_or_else(|| E::custom(format!("invalid amount: {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                Amount::from_f64(v).ok_or_else(|| E::custom(format!("invalid amount: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                v.checked_mul(100)
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(Amount::parse("4.50"), Some(Amount::from_cents(450)));
        assert_eq!(Amount::parse("4.5"), Some(Amount::from_cents(450)));
        assert_eq!(Amount::parse("$12"), Some(Amount::from_cents(1200)));
        assert_eq!(Amount::parse("1,200.99"), Some(Amount::from_cents(120_099)));
        assert_eq!(Amount::parse(".75"), Some(Amount::from_cents(75)));
        assert_eq!(Amount::parse("-3.25"), Some(Amount::from_cents(-325)));
    }

    #[test]
    fn rounds_third_fraction_digit() {
        assert_eq!(Amount::parse("1.005"), Some(Amount::from_cents(101)));
        assert_eq!(Amount::parse("1.004"), Some(Amount::from_cents(100)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Amount::parse(""), None);
        assert_eq!(Amount::parse("."), None);
        assert_eq!(Amount::parse("twelve"), None);
        assert_eq!(Amount::parse("1.2.3"), None);
    }

    #[test]
    fn displays_two_places() {
        assert_eq!(Amount::from_cents(450).to_string(), "4.50");
        assert_eq!(Amount::from_cents(5).to_string(), "0.05");
        assert_eq!(Amount::from_cents(-1999).to_string(), "-19.99");
    }

    #[test]
    fn float_conversion_avoids_drift() {
        assert_eq!(Amount::from_f64(4.50), Some(Amount::from_cents(450)));
        assert_eq!(Amount::from_f64(0.1 + 0.2), Some(Amount::from_cents(30)));
        assert_eq!(Amount::from_f64(f64::NAN), None);
    }

    #[test]
    fn serde_accepts_number_and_string() {
        let a: Amount = serde_json::from_str("4.5").unwrap();
        let b: Amount = serde_json::from_str("\"4.50\"").unwrap();
        let c: Amount = serde_json::from_str("12").unwrap();
        assert_eq!(a, b);
        assert_eq!(c, Amount::from_cents(1200));
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"4.50\"");
    }

    #[test]
    fn sums_and_differences() {
        let total: Amount = [450, 1050].into_iter().map(Amount::from_cents).sum();
        assert_eq!(total, Amount::from_cents(1500));
        assert_eq!(Amount::from_cents(100) - Amount::from_cents(250), Amount::from_cents(-150));
    }
}
