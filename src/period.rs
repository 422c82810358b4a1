//! The billing period passed to the invoice and PDF steps.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
}

/// A calendar month, e.g. March 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub const fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if month < 1 || month > 12 {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month containing `today`.
    pub fn containing(today: NaiveDate) -> Self {
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The month before this one; January wraps to December of the previous
    /// year.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Pick the period from the command-line flags.
    ///
    /// `--previous-month` wins, then an explicit `--month`/`--year` pair;
    /// anything else bills the current month.
    pub fn resolve(
        month: Option<u32>,
        year: Option<i32>,
        previous_month: bool,
        today: NaiveDate,
    ) -> Result<Self, PeriodError> {
        if previous_month {
            return Ok(Self::containing(today).previous());
        }
        match (month, year) {
            (Some(m), Some(y)) => Self::new(y, m),
            _ => Ok(Self::containing(today)),
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
