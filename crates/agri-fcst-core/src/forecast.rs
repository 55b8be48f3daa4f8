//! Forecast engine: validates inputs, fits a SARIMA(X) model to a monthly
//! series and produces a dated forecast path with prediction intervals.

use crate::aggregate::MonthlySeries;
use crate::error::{ForecastError, Result};
use crate::exog::{ExogFrame, ExogRow};
use crate::horizon::future_month_ends;
use crate::imputation::fill_nulls_interpolate;
use crate::sarima::{ForecastSpec, SarimaFit};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// One forecast month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub month_end: NaiveDate,
    /// Point forecast.
    pub value: f64,
    /// Lower prediction bound.
    pub lower: f64,
    /// Upper prediction bound.
    pub upper: f64,
}

/// Forecast result.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    /// One entry per forecast month, ascending.
    pub points: Vec<ForecastPoint>,
    /// Model name, e.g. `SARIMAX(1,1,1)(1,1,1)[12]`.
    pub model_name: String,
    /// Orders actually fitted after any reduction for short series.
    pub spec: ForecastSpec,
    /// Coverage of the prediction bounds.
    pub confidence_level: f64,
    /// Innovation variance estimate.
    pub sigma2: f64,
    /// Conditional log-likelihood; `None` for a perfect fit.
    pub log_likelihood: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    /// Regression coefficient per covariate column.
    pub exog_coefficients: Vec<(String, f64)>,
}

impl ForecastResult {
    /// Last entry of the path: the forecast for the requested month.
    pub fn terminal(&self) -> Option<&ForecastPoint> {
        self.points.last()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn month_ends(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.month_end).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Covariates for forecasting with external regressors.
///
/// `train` must cover exactly the months of the series being fitted;
/// `future` covers the forecast months with the same columns in the same
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExogenousData {
    pub train: ExogFrame,
    pub future: ExogFrame,
}

impl ExogenousData {
    pub fn new(train: ExogFrame, future: ExogFrame) -> Self {
        Self { train, future }
    }

    pub fn n_regressors(&self) -> usize {
        self.train.n_columns()
    }

    /// Check that the covariates line up with `series` and `horizon`.
    pub fn validate(&self, series: &MonthlySeries, horizon: usize) -> Result<()> {
        if self.train.month_ends() != series.month_ends() {
            return Err(ForecastError::CovariateMismatch(format!(
                "training covariates cover {} months but the series has {} (month ends must match)",
                self.train.len(),
                series.len()
            )));
        }
        if self.future.columns() != self.train.columns() {
            return Err(ForecastError::CovariateMismatch(format!(
                "future columns [{}] differ from training columns [{}]",
                self.future.columns().join(", "),
                self.train.columns().join(", ")
            )));
        }
        if self.future.len() != horizon {
            return Err(ForecastError::CovariateMismatch(format!(
                "future covariates have {} rows but the horizon is {}",
                self.future.len(),
                horizon
            )));
        }
        if let Some(last) = series.last() {
            if self.future.month_ends() != future_month_ends(last.month_end, horizon) {
                return Err(ForecastError::CovariateMismatch(
                    "future covariates must be dated on the months following the series"
                        .to_string(),
                ));
            }
        }
        let non_finite = self
            .train
            .rows()
            .iter()
            .chain(self.future.rows())
            .flat_map(|r| r.values.iter())
            .any(|v| !v.is_finite());
        if non_finite {
            return Err(ForecastError::ModelFitFailure(
                "covariates contain non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fit and forecast settings.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Coverage of the prediction bounds, in (0, 1).
    pub confidence_level: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
        }
    }
}

impl FitOptions {
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::invalid_parameter(
                "confidence_level",
                self.confidence_level,
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Fits SARIMA(X) models and produces forecasts.
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    options: FitOptions,
}

impl ForecastEngine {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fit `spec` to `series` and forecast `horizon` months ahead.
    pub fn fit_and_forecast(
        &self,
        series: &MonthlySeries,
        horizon: usize,
        spec: &ForecastSpec,
        exog: Option<&ExogenousData>,
    ) -> Result<ForecastResult> {
        let last = match series.last() {
            Some(last) if series.len() > 1 => last.month_end,
            _ => {
                return Err(ForecastError::InsufficientData {
                    needed: 2,
                    got: series.len(),
                })
            }
        };
        if horizon == 0 {
            return Err(ForecastError::invalid_parameter(
                "horizon",
                horizon,
                "must be at least 1",
            ));
        }
        self.options.validate()?;
        spec.validate()?;
        if let Some(x) = exog {
            x.validate(series, horizon)?;
        }
        let exog = exog.filter(|x| x.n_regressors() > 0);

        let (series, train) = if series.is_contiguous() {
            (series.clone(), exog.map(|x| x.train.clone()))
        } else {
            let regular = series.regularized();
            debug!(
                observed = series.len(),
                regularized = regular.len(),
                "interpolating absent months before fitting"
            );
            let train = exog
                .map(|x| regularize_frame(&x.train, &regular.month_ends()))
                .transpose()?;
            (regular, train)
        };

        let fit = SarimaFit::fit(&series, train.as_ref(), spec)?;
        let path = fit.forecast(
            horizon,
            exog.map(|x| &x.future),
            self.options.confidence_level,
        )?;
        if path.point.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "forecast path is not finite".to_string(),
            ));
        }

        let points = future_month_ends(last, horizon)
            .into_iter()
            .zip(path.point)
            .zip(path.lower.into_iter().zip(path.upper))
            .map(|((month_end, value), (lower, upper))| ForecastPoint {
                month_end,
                value,
                lower,
                upper,
            })
            .collect();

        let model_name = fit.spec().model_name(fit.has_exog());
        debug!(model = %model_name, horizon, "forecast complete");

        Ok(ForecastResult {
            points,
            model_name,
            spec: *fit.spec(),
            confidence_level: self.options.confidence_level,
            sigma2: fit.sigma2(),
            log_likelihood: fit.log_likelihood(),
            aic: fit.aic(),
            bic: fit.bic(),
            exog_coefficients: fit.exog_coefficients(),
        })
    }
}

/// Fit `spec` to `series` and forecast `horizon` months with default options.
pub fn fit_and_forecast(
    series: &MonthlySeries,
    horizon: usize,
    spec: &ForecastSpec,
    exog: Option<&ExogenousData>,
) -> Result<ForecastResult> {
    ForecastEngine::default().fit_and_forecast(series, horizon, spec, exog)
}

/// Reindex `frame` onto `months`, interpolating each column over the
/// inserted months.
fn regularize_frame(frame: &ExogFrame, months: &[NaiveDate]) -> Result<ExogFrame> {
    let lookup: BTreeMap<NaiveDate, &[f64]> = frame
        .rows()
        .iter()
        .map(|r| (r.month_end, r.values.as_slice()))
        .collect();

    let columns: Vec<Vec<f64>> = (0..frame.n_columns())
        .map(|j| {
            let sparse: Vec<Option<f64>> = months
                .iter()
                .map(|m| lookup.get(m).map(|values| values[j]))
                .collect();
            fill_nulls_interpolate(&sparse)
        })
        .collect();

    let rows = months
        .iter()
        .enumerate()
        .map(|(i, &month_end)| ExogRow {
            month_end,
            values: columns.iter().map(|c| c[i]).collect(),
        })
        .collect();
    ExogFrame::new(frame.columns().to_vec(), rows)
}
