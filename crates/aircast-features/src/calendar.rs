//! Cyclical calendar encodings.
//!
//! Each attribute `a` with period `p` becomes two features,
//! `sin(2π·a/p)` and `cos(2π·a/p)`. The raw attribute is never emitted.

use aircast_data::Frequency;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Calendar attribute of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarAttribute {
    /// Calendar year
    Year,
    /// Month of year, 1-12
    Month,
    /// Day of month, 1-31
    Day,
    /// Day of week, Monday = 0
    DayOfWeek,
    /// Hour of day, 0-23
    Hour,
    /// Minute of hour, 0-59
    Minute,
    /// ISO week of year, 1-53
    Week,
}

impl CalendarAttribute {
    /// Attribute name, prefix of its encoded features.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::DayOfWeek => "dayofweek",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Week => "week",
        }
    }

    /// Fixed period the attribute is divided by.
    pub const fn period(&self) -> f64 {
        match self {
            Self::Year => 2023.0,
            Self::Month => 12.0,
            Self::Day => 31.0,
            Self::DayOfWeek => 6.0,
            Self::Hour => 23.0,
            Self::Minute => 59.0,
            Self::Week => 52.0,
        }
    }

    /// Raw attribute value of `timestamp`.
    pub fn value(&self, timestamp: DateTime<Utc>) -> f64 {
        match self {
            Self::Year => f64::from(timestamp.year()),
            Self::Month => f64::from(timestamp.month()),
            Self::Day => f64::from(timestamp.day()),
            Self::DayOfWeek => f64::from(timestamp.weekday().num_days_from_monday()),
            Self::Hour => f64::from(timestamp.hour()),
            Self::Minute => f64::from(timestamp.minute()),
            Self::Week => f64::from(timestamp.iso_week().week()),
        }
    }

    /// `(sin, cos)` encoding of the attribute of `timestamp`.
    pub fn encode(&self, timestamp: DateTime<Utc>) -> (f64, f64) {
        let angle = 2.0 * PI * self.value(timestamp) / self.period();
        (angle.sin(), angle.cos())
    }
}

/// Attributes encoded for a frequency, in feature order.
pub const fn attributes(frequency: Frequency) -> &'static [CalendarAttribute] {
    use CalendarAttribute::*;
    match frequency {
        Frequency::Hourly => &[Year, Month, Day, DayOfWeek, Hour, Minute, Week],
        Frequency::Daily => &[Year, Month, Day, DayOfWeek, Week],
    }
}

/// Feature names of the encoded attributes, `_sin` before `_cos`.
pub fn feature_names(frequency: Frequency) -> Vec<String> {
    attributes(frequency)
        .iter()
        .flat_map(|a| [format!("{}_sin", a.name()), format!("{}_cos", a.name())])
        .collect()
}

/// Encoded calendar features of `timestamp`, aligned with [`feature_names`].
pub fn encode(frequency: Frequency, timestamp: DateTime<Utc>) -> Vec<f64> {
    attributes(frequency)
        .iter()
        .flat_map(|a| {
            let (sin, cos) = a.encode(timestamp);
            [sin, cos]
        })
        .collect()
}
