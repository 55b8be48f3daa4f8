//! Calendar-month arithmetic used for month-end bucketing and horizons.

use chrono::{Datelike, Months, NaiveDate};

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Zero-based month counter (`year * 12 + month0`).
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Number of month steps from the month of `from` to the month of `to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    month_index(to) - month_index(from)
}

/// Month end `n` months after the month containing `date`.
pub fn add_months(date: NaiveDate, n: u32) -> Option<NaiveDate> {
    month_start(date)
        .checked_add_months(Months::new(n))
        .map(month_end)
}

/// Consecutive month ends strictly after the month of `last`.
pub fn following_month_ends(last: NaiveDate, count: usize) -> Vec<NaiveDate> {
    (1..=count as u32)
        .map_while(|step| add_months(last, step))
        .collect()
}
