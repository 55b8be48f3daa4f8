//! Error types for the forecasting pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error types for pipeline operations.
///
/// Every variant is recoverable at the request boundary: callers render it
/// as a warning or error message and carry on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid horizon: target date {target} is not after the last observed month ({last})")]
    InvalidHorizon { target: NaiveDate, last: NaiveDate },

    #[error("Covariate mismatch: {0}")]
    CovariateMismatch(String),

    #[error("Covariate fetch failed: {0}")]
    CovariateFetchFailure(String),

    #[error("Model fit failed: {0}")]
    ModelFitFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
}

impl ForecastError {
    /// Convert to an error code for FFI.
    pub fn to_code(&self) -> i32 {
        match self {
            ForecastError::InvalidInput(_) => 2,
            ForecastError::InsufficientData { .. } => 3,
            ForecastError::InvalidHorizon { .. } => 4,
            ForecastError::CovariateMismatch(_) => 5,
            ForecastError::CovariateFetchFailure(_) => 6,
            ForecastError::ModelFitFailure(_) => 7,
            ForecastError::InvalidParameter { .. } => 8,
        }
    }

    pub(crate) fn invalid_parameter(
        param: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ForecastError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ForecastError::InvalidInput("test".into()).to_code(), 2);
        assert_eq!(
            ForecastError::InsufficientData { needed: 2, got: 1 }.to_code(),
            3
        );
        let d = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();
        assert_eq!(
            ForecastError::InvalidHorizon { target: d, last: d }.to_code(),
            4
        );
        assert_eq!(ForecastError::CovariateMismatch("x".into()).to_code(), 5);
        assert_eq!(ForecastError::CovariateFetchFailure("x".into()).to_code(), 6);
        assert_eq!(ForecastError::ModelFitFailure("x".into()).to_code(), 7);
        assert_eq!(
            ForecastError::invalid_parameter("horizon", 0, "must be positive").to_code(),
            8
        );
    }

    #[test]
    fn test_error_display() {
        let err = ForecastError::InsufficientData { needed: 2, got: 1 };
        assert_eq!(
            format!("{}", err),
            "Insufficient data: need at least 2 observations, got 1"
        );

        let err = ForecastError::InvalidHorizon {
            target: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            last: NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
        };
        assert_eq!(
            format!("{}", err),
            "Invalid horizon: target date 2023-03-01 is not after the last observed month (2023-03-31)"
        );

        let err = ForecastError::invalid_parameter("confidence_level", 1.5, "must be in (0, 1)");
        assert_eq!(
            format!("{}", err),
            "Invalid parameter 'confidence_level' = '1.5': must be in (0, 1)"
        );

        let err = ForecastError::CovariateFetchFailure("HTTP 503".into());
        assert_eq!(format!("{}", err), "Covariate fetch failed: HTTP 503");
    }
}
