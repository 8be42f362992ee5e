//! Sampling frequency of a forecast pipeline.
//!
//! Every frequency-dependent constant of the engine (lag offsets, rolling
//! windows, fold month ratios, calendar attributes) is resolved through one
//! exhaustive match on [`Frequency`]. Free-form tags only enter the system
//! through [`Frequency::from_str`], which rejects anything unknown.

use crate::error::DataError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One observation per hour
    Hourly,
    /// One observation per calendar day
    Daily,
}

impl Frequency {
    /// All supported frequencies.
    pub const fn all() -> [Self; 2] {
        [Self::Hourly, Self::Daily]
    }

    /// Tag used in configuration and storage keys.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Unit suffix used in feature names (`pm2_5_last_1_hour`).
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Hourly => "hour",
            Self::Daily => "day",
        }
    }

    /// Length of one step.
    pub fn step(&self) -> TimeDelta {
        match self {
            Self::Hourly => TimeDelta::hours(1),
            Self::Daily => TimeDelta::days(1),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(DataError::InvalidFrequency(other.to_string())),
        }
    }
}

impl TryFrom<&str> for Frequency {
    type Error = DataError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hourly", Frequency::Hourly)]
    #[case("daily", Frequency::Daily)]
    fn test_parse_known_tags(#[case] tag: &str, #[case] expected: Frequency) {
        assert_eq!(tag.parse::<Frequency>().unwrap(), expected);
        assert_eq!(expected.to_string(), tag);
    }

    #[rstest]
    #[case("weekly")]
    #[case("Hourly")]
    #[case("")]
    fn test_parse_unknown_tag_fails(#[case] tag: &str) {
        let err = Frequency::try_from(tag).unwrap_err();
        assert!(matches!(err, DataError::InvalidFrequency(t) if t == tag));
    }

    #[test]
    fn test_step_lengths() {
        assert_eq!(Frequency::Hourly.step(), TimeDelta::hours(1));
        assert_eq!(Frequency::Daily.step(), TimeDelta::days(1));
    }

    #[test]
    fn test_serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&Frequency::Daily).unwrap();
        assert_eq!(json, "\"daily\"");
        let back: Frequency = serde_json::from_str("\"hourly\"").unwrap();
        assert_eq!(back, Frequency::Hourly);
    }
}
