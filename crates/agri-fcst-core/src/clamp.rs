//! Bounding forecast output to a plausible price range.

use crate::error::{ForecastError, Result};
use crate::forecast::ForecastResult;

/// Clamp `value` into `[min_bound, max_bound]`.
///
/// Computed as `max(min_bound, min(max_bound, value))`; never fails.
pub fn clamp(value: f64, min_bound: f64, max_bound: f64) -> f64 {
    min_bound.max(max_bound.min(value))
}

/// Validated price range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    min: f64,
    max: f64,
}

impl PriceBounds {
    /// Range used for the bundled vegetable markets, in INR/kg.
    pub const INR_PER_KG: PriceBounds = PriceBounds {
        min: 10.0,
        max: 100.0,
    };

    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ForecastError::invalid_parameter(
                "bounds",
                format!("[{}, {}]", min, max),
                "bounds must be finite",
            ));
        }
        if min > max {
            return Err(ForecastError::invalid_parameter(
                "bounds",
                format!("[{}, {}]", min, max),
                "min must not exceed max",
            ));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        clamp(value, self.min, self.max)
    }

    /// Clamp every point forecast and prediction bound of a result.
    pub fn clamp_result(&self, result: &ForecastResult) -> ForecastResult {
        let mut clamped = result.clone();
        for point in clamped.points.iter_mut() {
            point.value = self.clamp(point.value);
            point.lower = self.clamp(point.lower);
            point.upper = self.clamp(point.upper);
        }
        clamped
    }
}
