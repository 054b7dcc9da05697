//! Look-back periods for trend queries.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InputError;

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    /// One hour.
    Hours,
    /// One day.
    Days,
    /// Thirty days.
    Months,
    /// 365 days.
    Years,
}

impl PeriodUnit {
    fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'H' => Some(PeriodUnit::Hours),
            'D' => Some(PeriodUnit::Days),
            'M' => Some(PeriodUnit::Months),
            'Y' => Some(PeriodUnit::Years),
            _ => None,
        }
    }

    /// Uppercase letter used in the textual form.
    pub fn letter(&self) -> char {
        match self {
            PeriodUnit::Hours => 'H',
            PeriodUnit::Days => 'D',
            PeriodUnit::Months => 'M',
            PeriodUnit::Years => 'Y',
        }
    }

    fn hours(&self) -> i64 {
        match self {
            PeriodUnit::Hours => 1,
            PeriodUnit::Days => 24,
            PeriodUnit::Months => 30 * 24,
            PeriodUnit::Years => 365 * 24,
        }
    }
}

/// A look-back window such as `24H`, `7D`, `1M` or `1Y`.
///
/// Serialized in its textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub amount: u32,
    pub unit: PeriodUnit,
}

impl Period {
    /// Create a period, rejecting a zero amount.
    pub fn new(amount: u32, unit: PeriodUnit) -> Option<Self> {
        (amount > 0).then_some(Self { amount, unit })
    }

    /// Parse `<digits><unit>`; the unit letter is case-insensitive.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let invalid = || InputError::InvalidPeriod(input.to_string());
        let trimmed = input.trim();

        let unit_char = trimmed.chars().last().ok_or_else(invalid)?;
        let unit = PeriodUnit::from_letter(unit_char).ok_or_else(invalid)?;

        let digits = &trimmed[..trimmed.len() - unit_char.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let amount: u32 = digits.parse().map_err(|_| invalid())?;
        let period = Self::new(amount, unit).ok_or_else(invalid)?;

        // Reject periods whose length does not fit a chrono Duration.
        period.checked_duration().ok_or_else(invalid)?;

        Ok(period)
    }

    fn checked_duration(&self) -> Option<Duration> {
        let hours = i64::from(self.amount).checked_mul(self.unit.hours())?;
        Duration::try_hours(hours)
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.checked_duration().unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.letter())
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl FromStr for Period {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(Period::parse("24H").unwrap().duration(), Duration::hours(24));
        assert_eq!(Period::parse("7D").unwrap().duration(), Duration::days(7));
        assert_eq!(Period::parse("1M").unwrap().duration(), Duration::days(30));
        assert_eq!(Period::parse("2Y").unwrap().duration(), Duration::days(730));
    }

    #[test]
    fn test_parse_normalizes_unit() {
        let period = Period::parse("7d").unwrap();
        assert_eq!(period.to_string(), "7D");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "D", "7", "7W", "-1D", "1.5D", "D7", "0D", "7 D", "99999999999D"] {
            assert_eq!(
                Period::parse(input),
                Err(InputError::InvalidPeriod(input.to_string())),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_uses_text_form() {
        let period = Period::parse("12h").unwrap();
        assert_eq!(serde_json::to_string(&period).unwrap(), "\"12H\"");
        assert_eq!(serde_json::from_str::<Period>("\"3Y\"").unwrap().to_string(), "3Y");
        assert!(serde_json::from_str::<Period>("\"3W\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(amount in 1u32..100_000, unit in 0usize..4) {
            let unit = [PeriodUnit::Hours, PeriodUnit::Days, PeriodUnit::Months, PeriodUnit::Years][unit];
            let period = Period::new(amount, unit).unwrap();
            prop_assert_eq!(Period::parse(&period.to_string()).unwrap(), period);
        }
    }
}
