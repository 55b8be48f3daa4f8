//! C-compatible type definitions for FFI boundary.
//!
//! Dates cross the boundary as `int32_t` days since 1970-01-01, the same
//! encoding DuckDB and Arrow use for `DATE`.

use agri_fcst_core::{ForecastError, ForecastSpec};
use libc::{c_char, c_double, c_int, size_t};

/// Error codes for FFI boundary.
///
/// Codes 2 to 8 mirror [`ForecastError::to_code`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = 1,
    InvalidInput = 2,
    InsufficientData = 3,
    InvalidHorizon = 4,
    CovariateMismatch = 5,
    CovariateFetchFailure = 6,
    ModelFitFailure = 7,
    InvalidParameter = 8,
    PanicCaught = 9,
    AllocationError = 10,
}

impl From<&ForecastError> for ErrorCode {
    fn from(err: &ForecastError) -> Self {
        match err.to_code() {
            2 => ErrorCode::InvalidInput,
            3 => ErrorCode::InsufficientData,
            4 => ErrorCode::InvalidHorizon,
            5 => ErrorCode::CovariateMismatch,
            6 => ErrorCode::CovariateFetchFailure,
            7 => ErrorCode::ModelFitFailure,
            _ => ErrorCode::InvalidParameter,
        }
    }
}

/// Error structure with message buffer for FFI.
#[repr(C)]
pub struct AgriError {
    pub code: ErrorCode,
    pub message: [c_char; 256],
}

impl AgriError {
    /// Create a success error (no error).
    pub fn success() -> Self {
        Self {
            code: ErrorCode::Success,
            message: [0; 256],
        }
    }

    /// Set an error with code and message, truncating to the buffer.
    pub fn set_error(&mut self, code: ErrorCode, msg: &str) {
        self.code = code;
        let len = copy_string_to_buffer(msg, &mut self.message);
        self.message[len] = 0;
    }

    /// Message as a Rust string, up to the first NUL.
    pub fn message(&self) -> String {
        let bytes: Vec<u8> = self
            .message
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for AgriError {
    fn default() -> Self {
        Self::success()
    }
}

/// Copy `s` into a NUL-terminated C buffer; returns the bytes copied.
pub(crate) fn copy_string_to_buffer<const N: usize>(s: &str, buffer: &mut [c_char; N]) -> usize {
    let bytes = s.as_bytes();
    let len = bytes.len().min(N.saturating_sub(1));
    for (dst, &b) in buffer.iter_mut().zip(&bytes[..len]) {
        *dst = b as c_char;
    }
    if N > 0 {
        buffer[len] = 0;
    }
    len
}

/// How market and commodity keys are compared.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatchMode {
    Exact = 0,
    Normalized = 1,
}

/// Daily price records in columnar form.
#[repr(C)]
pub struct PriceRecords {
    /// Observation dates, days since epoch
    pub dates: *const i32,
    /// Market names (null-terminated strings)
    pub markets: *const *const c_char,
    /// Commodity names (null-terminated strings)
    pub commodities: *const *const c_char,
    /// Prices
    pub prices: *const c_double,
    /// Number of records
    pub length: size_t,
}

/// A monthly price series.
#[repr(C)]
pub struct MonthlySeriesArray {
    /// Month-end dates, days since epoch, strictly ascending
    pub month_ends: *const i32,
    /// Monthly mean prices
    pub values: *const c_double,
    /// Number of months
    pub length: size_t,
}

/// Aggregation output; release with `agri_free_monthly_series`.
#[repr(C)]
pub struct MonthlySeriesResult {
    pub month_ends: *mut i32,
    pub values: *mut c_double,
    pub length: size_t,
}

impl Default for MonthlySeriesResult {
    fn default() -> Self {
        Self {
            month_ends: std::ptr::null_mut(),
            values: std::ptr::null_mut(),
            length: 0,
        }
    }
}

/// Model orders and interval settings.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SarimaOptions {
    pub p: c_int,
    pub d: c_int,
    pub q: c_int,
    pub seasonal_p: c_int,
    pub seasonal_d: c_int,
    pub seasonal_q: c_int,
    /// Season length; 0 disables the seasonal part
    pub seasonal_period: c_int,
    /// Confidence level (0-1)
    pub confidence_level: c_double,
}

impl Default for SarimaOptions {
    fn default() -> Self {
        let spec = ForecastSpec::default();
        Self {
            p: spec.order.p as c_int,
            d: spec.order.d as c_int,
            q: spec.order.q as c_int,
            seasonal_p: spec.seasonal.p as c_int,
            seasonal_d: spec.seasonal.d as c_int,
            seasonal_q: spec.seasonal.q as c_int,
            seasonal_period: spec.seasonal.s as c_int,
            confidence_level: 0.95,
        }
    }
}

/// Covariates for a forecast, column-major.
///
/// `train` holds `n_regressors` columns of series length; `future` holds
/// `n_regressors` columns of horizon length.
#[repr(C)]
pub struct ExogArrays {
    pub train: *const c_double,
    pub future: *const c_double,
    pub n_regressors: size_t,
}

/// Forecast output; release with `agri_free_forecast_result`.
#[repr(C)]
pub struct PriceForecastResult {
    /// Month-end dates of the forecast path, days since epoch
    pub month_ends: *mut i32,
    /// Point forecasts array
    pub point_forecasts: *mut c_double,
    /// Lower confidence bounds
    pub lower_bounds: *mut c_double,
    /// Upper confidence bounds
    pub upper_bounds: *mut c_double,
    /// Number of forecast points
    pub n_forecasts: size_t,
    /// Model name
    pub model_name: [c_char; 64],
    /// Innovation variance
    pub sigma2: c_double,
    /// AIC (Akaike Information Criterion), NaN when undefined
    pub aic: c_double,
    /// BIC (Bayesian Information Criterion), NaN when undefined
    pub bic: c_double,
}

impl Default for PriceForecastResult {
    fn default() -> Self {
        Self {
            month_ends: std::ptr::null_mut(),
            point_forecasts: std::ptr::null_mut(),
            lower_bounds: std::ptr::null_mut(),
            upper_bounds: std::ptr::null_mut(),
            n_forecasts: 0,
            model_name: [0; 64],
            sigma2: f64::NAN,
            aic: f64::NAN,
            bic: f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mirrors_core() {
        let cases = [
            (ForecastError::InvalidInput("x".into()), ErrorCode::InvalidInput),
            (
                ForecastError::InsufficientData { needed: 2, got: 1 },
                ErrorCode::InsufficientData,
            ),
            (ForecastError::CovariateMismatch("x".into()), ErrorCode::CovariateMismatch),
            (
                ForecastError::CovariateFetchFailure("x".into()),
                ErrorCode::CovariateFetchFailure,
            ),
            (ForecastError::ModelFitFailure("x".into()), ErrorCode::ModelFitFailure),
        ];
        for (err, code) in cases {
            assert_eq!(ErrorCode::from(&err), code);
            assert_eq!(code as i32, err.to_code());
        }
    }

    #[test]
    fn test_set_error_truncates() {
        let mut error = AgriError::default();
        let long = "x".repeat(400);
        error.set_error(ErrorCode::ModelFitFailure, &long);
        assert_eq!(error.code, ErrorCode::ModelFitFailure);
        assert_eq!(error.message().len(), 255);
        assert_eq!(error.message[255], 0);
    }

    #[test]
    fn test_default_options() {
        let opts = SarimaOptions::default();
        assert_eq!((opts.p, opts.d, opts.q), (1, 1, 1));
        assert_eq!(opts.seasonal_period, 12);
    }
}
