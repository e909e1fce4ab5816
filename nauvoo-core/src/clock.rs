//! Calendar model: fixed 30-day months, 12 months a year, minute resolution.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DAYS_PER_MONTH, MINUTES_PER_DAY, MINUTES_PER_HOUR, MONTHS_PER_YEAR, START_DAY, START_MINUTE,
    START_MONTH, START_YEAR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Season for a 1-based month number.
    #[must_use]
    pub const fn from_month(month: u8) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Fall,
            _ => Self::Winter,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
            Self::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" => Ok(Self::Fall),
            "winter" => Ok(Self::Winter),
            _ => Err(()),
        }
    }
}

/// A point on the simulated calendar.
///
/// `minute` is the minute of the day. All fields stay normalized: `minute < 1440`,
/// `day` in `1..=30`, `month` in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub minute: u32,
}

impl Default for SimTime {
    fn default() -> Self {
        Self::new(START_YEAR, START_MONTH, START_DAY, START_MINUTE)
    }
}

impl SimTime {
    /// Build a time without validation; use [`SimTime::is_normalized`] on untrusted input.
    #[must_use]
    pub const fn new(year: i32, month: u8, day: u8, minute: u32) -> Self {
        Self {
            year,
            month,
            day,
            minute,
        }
    }

    #[must_use]
    pub const fn season(&self) -> Season {
        Season::from_month(self.month)
    }

    #[must_use]
    pub const fn hour(&self) -> u32 {
        self.minute / MINUTES_PER_HOUR
    }

    #[must_use]
    pub const fn minute_of_hour(&self) -> u32 {
        self.minute % MINUTES_PER_HOUR
    }

    /// Whether every field is inside its calendar range.
    #[must_use]
    pub const fn is_normalized(&self) -> bool {
        self.minute < MINUTES_PER_DAY
            && self.day >= 1
            && self.day <= DAYS_PER_MONTH
            && self.month >= 1
            && self.month <= MONTHS_PER_YEAR
    }

    /// Absolute minute count; orders times chronologically.
    #[must_use]
    pub fn total_minutes(&self) -> i64 {
        let days_per_year = i64::from(DAYS_PER_MONTH) * i64::from(MONTHS_PER_YEAR);
        let day_index = i64::from(self.year) * days_per_year
            + (i64::from(self.month) - 1) * i64::from(DAYS_PER_MONTH)
            + (i64::from(self.day) - 1);
        day_index * i64::from(MINUTES_PER_DAY) + i64::from(self.minute)
    }

    /// Minutes elapsed from `earlier` to `self`, saturating at zero.
    #[must_use]
    pub fn minutes_since(&self, earlier: &Self) -> u64 {
        u64::try_from(self.total_minutes() - earlier.total_minutes()).unwrap_or(0)
    }

    /// Advance by `minutes`, cascading day, month and year.
    ///
    /// Returns the number of day rollovers that happened; callers run their
    /// once-per-day maintenance exactly that many times. Zero minutes is a no-op.
    pub fn advance(&mut self, minutes: u32) -> u32 {
        if minutes == 0 {
            return 0;
        }
        let total = u64::from(self.minute) + u64::from(minutes);
        let day_span = u64::from(MINUTES_PER_DAY);
        let rollovers = total / day_span;
        self.minute = u32::try_from(total % day_span).unwrap_or(0);
        if rollovers == 0 {
            return 0;
        }

        let days_per_month = u64::from(DAYS_PER_MONTH);
        let months_per_year = u64::from(MONTHS_PER_YEAR);
        let day_index = u64::from(self.day.saturating_sub(1)) + rollovers;
        self.day = u8::try_from(day_index % days_per_month).unwrap_or(0) + 1;
        let month_index = u64::from(self.month.saturating_sub(1)) + day_index / days_per_month;
        self.month = u8::try_from(month_index % months_per_year).unwrap_or(0) + 1;
        let years = i32::try_from(month_index / months_per_year).unwrap_or(i32::MAX);
        self.year = self.year.saturating_add(years);

        u32::try_from(rollovers).unwrap_or(u32::MAX)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.total_minutes().cmp(&other.total_minutes())
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour(),
            self.minute_of_hour()
        )
    }
}

/// Render a minute-of-day as `HH:MM`.
#[must_use]
pub fn format_minute_of_day(minute: u32) -> String {
    format!(
        "{:02}:{:02}",
        minute / MINUTES_PER_HOUR,
        minute % MINUTES_PER_HOUR
    )
}
