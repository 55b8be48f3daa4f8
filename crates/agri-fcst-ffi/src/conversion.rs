//! Parameter conversion utilities for FFI functions.

use agri_fcst_core::{ForecastError, ForecastSpec, KeyMatch};
use chrono::{Datelike, NaiveDate};
use core::ffi::{c_char, c_int};
use std::ffi::CStr;

use crate::types::{KeyMatchMode, SarimaOptions};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert days since 1970-01-01 to a date.
#[inline]
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Convert a date to days since 1970-01-01.
#[inline]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Like [`days_to_date`], reporting out-of-range values as invalid input.
pub fn parse_date(days: i32) -> Result<NaiveDate, ForecastError> {
    days_to_date(days)
        .ok_or_else(|| ForecastError::InvalidInput(format!("date {} is out of range", days)))
}

/// Convert a C string pointer to a Rust `&str`, using `default` for null.
///
/// Bytes that are not UTF-8 are rejected as invalid input naming `field`.
///
/// # Safety
/// The pointer must be null or point to a valid null-terminated string.
#[inline]
pub unsafe fn c_str_to_str<'a>(
    ptr: *const c_char,
    default: &'a str,
    field: &str,
) -> Result<&'a str, ForecastError> {
    if ptr.is_null() {
        return Ok(default);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| ForecastError::InvalidInput(format!("{} is not valid UTF-8: {}", field, e)))
}

fn order(value: c_int, name: &str) -> Result<usize, ForecastError> {
    usize::try_from(value).map_err(|_| ForecastError::InvalidParameter {
        param: name.to_string(),
        value: value.to_string(),
        reason: "orders must be non-negative".to_string(),
    })
}

/// Model specification from C options; negative orders are rejected.
pub fn to_forecast_spec(opts: &SarimaOptions) -> Result<ForecastSpec, ForecastError> {
    Ok(ForecastSpec::new(
        (order(opts.p, "p")?, order(opts.d, "d")?, order(opts.q, "q")?),
        (
            order(opts.seasonal_p, "seasonal_p")?,
            order(opts.seasonal_d, "seasonal_d")?,
            order(opts.seasonal_q, "seasonal_q")?,
            order(opts.seasonal_period, "seasonal_period")?,
        ),
    ))
}

impl From<KeyMatchMode> for KeyMatch {
    fn from(mode: KeyMatchMode) -> Self {
        match mode {
            KeyMatchMode::Exact => KeyMatch::Exact,
            KeyMatchMode::Normalized => KeyMatch::Normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_round_trip_anchor() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(days_to_date(0), Some(epoch));
        assert_eq!(date_to_days(epoch), 0);

        let d = NaiveDate::from_ymd_opt(2023, 4, 30).unwrap();
        assert_eq!(date_to_days(d), 19_477);
        assert_eq!(days_to_date(-1), NaiveDate::from_ymd_opt(1969, 12, 31));
        assert!(parse_date(i32::MAX).is_err());
    }

    #[test]
    fn test_c_str_to_str() {
        use std::ffi::CString;

        let c_string = CString::new("Chennai").unwrap();
        unsafe {
            assert_eq!(c_str_to_str(c_string.as_ptr(), "", "market"), Ok("Chennai"));
            assert_eq!(c_str_to_str(std::ptr::null(), "default", "market"), Ok("default"));
        }
    }

    #[test]
    fn test_c_str_rejects_invalid_utf8() {
        let latin1 = CStr::from_bytes_with_nul(b"Tiruch\xe9ngode\0").unwrap();
        let err = unsafe { c_str_to_str(latin1.as_ptr(), "", "commodity") }.unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(ref m) if m.starts_with("commodity")));
    }

    #[test]
    fn test_to_forecast_spec() {
        let spec = to_forecast_spec(&SarimaOptions::default()).unwrap();
        assert_eq!(spec, ForecastSpec::default());

        let opts = SarimaOptions {
            q: -1,
            ..SarimaOptions::default()
        };
        assert!(matches!(
            to_forecast_spec(&opts),
            Err(ForecastError::InvalidParameter { ref param, .. }) if param == "q"
        ));
    }
}
