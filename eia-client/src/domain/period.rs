use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Month};

/// A calendar month, always normalized to its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(Date);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid period '{input}': {reason}")]
pub struct PeriodParseError {
    pub input: String,
    pub reason: String,
}

impl Period {
    pub fn new(year: i32, month: u8) -> Result<Self, PeriodParseError> {
        let m = Month::try_from(month).map_err(|e| PeriodParseError {
            input: format!("{year}-{month}"),
            reason: e.to_string(),
        })?;
        let date = Date::from_calendar_date(year, m, 1).map_err(|e| PeriodParseError {
            input: format!("{year}-{month}"),
            reason: e.to_string(),
        })?;
        Ok(Self(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Month number in `1..=12`.
    pub fn month(&self) -> u8 {
        self.0.month() as u8
    }

    pub fn first_day(&self) -> Date {
        self.0
    }

    /// The period `n` months later.
    pub fn plus_months(&self, n: u32) -> Self {
        let zero_based = self.year() as i64 * 12 + (self.month() as i64 - 1) + n as i64;
        let year = zero_based.div_euclid(12) as i32;
        let month = (zero_based.rem_euclid(12) + 1) as u8;
        // Both components are in range by construction.
        match Month::try_from(month).ok().and_then(|m| Date::from_calendar_date(year, m, 1).ok()) {
            Some(date) => Self(date),
            None => *self,
        }
    }

    pub fn next(&self) -> Self {
        self.plus_months(1)
    }

    /// Whole months from `self` to `later` (negative if `later` is earlier).
    pub fn months_until(&self, later: &Period) -> i64 {
        let a = self.year() as i64 * 12 + self.month() as i64;
        let b = later.year() as i64 * 12 + later.month() as i64;
        b - a
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-01", self.year(), self.month())
    }
}

/// Accepts `YYYY-MM` (upstream form) and `YYYY-MM-DD` with day `01`.
impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = |reason: &str| PeriodParseError {
            input: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = trimmed.split('-');
        let year: i32 = parts
            .next()
            .filter(|p| p.len() == 4)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| err("expected four-digit year"))?;
        let month: u8 = parts
            .next()
            .filter(|p| p.len() == 2)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| err("expected two-digit month"))?;
        match parts.next() {
            None => {}
            Some("01") => {}
            Some(_) => return Err(err("day must be 01")),
        }
        if parts.next().is_some() {
            return Err(err("trailing components"));
        }

        Period::new(year, month).map_err(|e| err(&e.reason))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
