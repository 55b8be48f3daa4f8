//! Conversion of a target date into a forecast horizon in months.

use crate::aggregate::MonthlySeries;
use crate::calendar::{following_month_ends, months_between};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// Number of months between the last observed month and `target_date`.
///
/// Works at month granularity: every target date inside the same calendar
/// month yields the same horizon. The target must fall strictly after the
/// last observed month end, which guarantees a horizon of at least one.
pub fn resolve(series: &MonthlySeries, target_date: NaiveDate) -> Result<usize> {
    let last = series
        .last()
        .ok_or(ForecastError::InsufficientData { needed: 1, got: 0 })?
        .month_end;

    if target_date <= last {
        return Err(ForecastError::InvalidHorizon {
            target: target_date,
            last,
        });
    }

    Ok(months_between(last, target_date) as usize)
}

/// Month ends of a forecast path of `horizon` steps after `last`.
pub fn future_month_ends(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    following_month_ends(last, horizon)
}
