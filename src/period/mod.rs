//! Period Event Matrix: per-period event entry for one classroom and day.

pub mod catalog;
pub mod error;
pub mod materialize;
pub mod matrix;
pub mod resolver;
pub mod sync;
pub mod transform;
pub mod workflow;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{PeriodError, ResolutionMiss};

pub const PERIOD_COUNT: usize = 7;

/// One of the seven teaching slots of a school day, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Period(u8);

impl Period {
    pub const FIRST: Period = Period(1);
    pub const LAST: Period = Period(PERIOD_COUNT as u8);

    pub fn new(n: i64) -> Result<Period, PeriodError> {
        if (1..=PERIOD_COUNT as i64).contains(&n) {
            Ok(Period(n as u8))
        } else {
            Err(PeriodError::InvalidPeriod(n))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn all() -> impl Iterator<Item = Period> {
        (1..=PERIOD_COUNT as u8).map(Period)
    }

    pub fn next(self) -> Option<Period> {
        if self < Period::LAST {
            Some(Period(self.0 + 1))
        } else {
            None
        }
    }

    pub fn prev(self) -> Option<Period> {
        if self > Period::FIRST {
            Some(Period(self.0 - 1))
        } else {
            None
        }
    }
}

impl TryFrom<i64> for Period {
    type Error = PeriodError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Period::new(n)
    }
}

impl From<Period> for u8 {
    fn from(p: Period) -> u8 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates a `YYYY-MM-DD` calendar date and returns it normalized.
pub fn parse_date(raw: &str) -> Result<String, PeriodError> {
    let t = raw.trim();
    chrono::NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| PeriodError::InvalidDate(raw.to_string()))
}
