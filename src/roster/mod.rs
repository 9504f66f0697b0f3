//! Roster mutation core: slot lookup, single-day overwrites, range
//! projections and exchange swaps, all written through
//! [`RosterRepository::merge_write`](crate::repositories::RosterRepository::merge_write).

pub mod engine;
pub mod error;
pub mod month_key;

use chrono::NaiveDate;

pub use engine::{FailedDate, MutationEngine, RangeOverrideReport, SideOutcome, SlotOutcome, SwapReport};
pub use error::{FailureReason, RosterError};
pub use month_key::{MonthKeyResolver, MonthLocale, NamedMonthKeys};

/// Longest range a single override may cover, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, RosterError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| RosterError::InvalidDateRange(format!("'{}' is not a yyyy-mm-dd date", value)))
}

/// Inclusive list of dates in `[start, end]`, checked against [`MAX_RANGE_DAYS`].
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RosterError> {
    if end < start {
        return Err(RosterError::InvalidDateRange(format!("{} is before {}", end, start)));
    }
    let span = (end - start).num_days() + 1;
    if span > MAX_RANGE_DAYS {
        return Err(RosterError::InvalidDateRange(format!(
            "{} days requested, at most {} allowed",
            span, MAX_RANGE_DAYS
        )));
    }
    Ok(start.iter_days().take(span as usize).collect())
}
