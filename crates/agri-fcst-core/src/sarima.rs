//! Seasonal ARIMA orders and the fitted model.
//!
//! Estimation is delegated to `anofox_forecast`'s SARIMA, which regresses
//! the series on any named covariates first and fits the seasonal ARMA
//! errors on the residuals by conditional sum of squares. When a series is
//! too short for the requested orders, the estimator's refusal drives a
//! stepwise reduction; see [`ForecastSpec::reduced`].

use crate::aggregate::MonthlySeries;
use crate::error::{ForecastError, Result};
use crate::exog::ExogFrame;
use anofox_forecast::core::{CalendarAnnotations, TimeSeries, TimeSeriesBuilder};
use anofox_forecast::models::arima::SARIMA;
use anofox_forecast::models::Forecaster;
use anofox_forecast::ForecastError as ModelError;
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Non-seasonal `(p, d, q)` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal `(P, D, Q, s)` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Season length in months.
    pub s: usize,
}

impl SeasonalOrder {
    pub fn has_terms(&self) -> bool {
        self.p > 0 || self.d > 0 || self.q > 0
    }
}

/// Orders of a SARIMA model.
///
/// Defaults to `(1,1,1)x(1,1,1,12)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastSpec {
    pub order: ArimaOrder,
    pub seasonal: SeasonalOrder,
}

impl Default for ForecastSpec {
    fn default() -> Self {
        Self::new((1, 1, 1), (1, 1, 1, 12))
    }
}

impl ForecastSpec {
    pub const fn new(order: (usize, usize, usize), seasonal: (usize, usize, usize, usize)) -> Self {
        Self {
            order: ArimaOrder {
                p: order.0,
                d: order.1,
                q: order.2,
            },
            seasonal: SeasonalOrder {
                p: seasonal.0,
                d: seasonal.1,
                q: seasonal.2,
                s: seasonal.3,
            },
        }
    }

    /// Model without a seasonal component.
    pub const fn non_seasonal(p: usize, d: usize, q: usize) -> Self {
        Self::new((p, d, q), (0, 0, 0, 0))
    }

    pub fn validate(&self) -> Result<()> {
        if self.seasonal.has_terms() && self.seasonal.s < 2 {
            return Err(ForecastError::invalid_parameter(
                "seasonal_order",
                self,
                "season length must be at least 2 when seasonal terms are present",
            ));
        }
        if self.min_observations().is_none() || self.residual_offset().is_none() {
            return Err(ForecastError::invalid_parameter(
                "seasonal_order",
                self,
                "lag span overflows; season length or seasonal orders are too large",
            ));
        }
        Ok(())
    }

    /// Number of ARMA coefficients (`p + q + P + Q`).
    pub fn n_arma_params(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    /// Lag span of the expanded autoregressive polynomial (`p + sP`).
    pub fn ar_lags(&self) -> Option<usize> {
        self.seasonal.s.checked_mul(self.seasonal.p)?.checked_add(self.order.p)
    }

    /// Lag span of the expanded moving-average polynomial (`q + sQ`).
    pub fn ma_lags(&self) -> Option<usize> {
        self.seasonal.s.checked_mul(self.seasonal.q)?.checked_add(self.order.q)
    }

    /// Observations consumed by differencing (`d + sD`).
    pub fn diff_lags(&self) -> Option<usize> {
        self.seasonal.s.checked_mul(self.seasonal.d)?.checked_add(self.order.d)
    }

    /// Shortest series the estimator accepts:
    /// `d + sD + max(p, q, s·max(P, Q)) + 2`.
    pub fn min_observations(&self) -> Option<usize> {
        let so = self.seasonal;
        let seasonal_lag = if so.s > 1 {
            so.s.checked_mul(so.p.max(so.q))?
        } else {
            0
        };
        let widest = self.order.p.max(self.order.q).max(seasonal_lag);
        self.diff_lags()?.checked_add(widest)?.checked_add(2)
    }

    /// Index of the first differenced observation with a conditional residual.
    fn residual_offset(&self) -> Option<usize> {
        Some(self.ar_lags()?.max(self.ma_lags()?))
    }

    /// Whether `n_obs` observations leave at least one conditional residual
    /// after differencing.
    fn leaves_residuals(&self, n_obs: usize) -> bool {
        match (self.diff_lags(), self.residual_offset()) {
            (Some(diff), Some(offset)) => n_obs.saturating_sub(diff) > offset,
            _ => false,
        }
    }

    /// The next smaller model, or `None` once only a mean remains.
    ///
    /// Seasonal differencing goes first while seasonal ARMA terms remain,
    /// then seasonal ARMA terms, then non-seasonal ARMA terms, then
    /// non-seasonal differencing.
    pub fn reduced(&self) -> Option<ForecastSpec> {
        let mut spec = *self;
        let (o, so) = (&mut spec.order, &mut spec.seasonal);
        if so.d > 0 && (so.p > 0 || so.q > 0) {
            so.d -= 1;
        } else if so.p > 0 || so.q > 0 {
            if so.q >= so.p {
                so.q -= 1;
            } else {
                so.p -= 1;
            }
        } else if so.d > 0 {
            so.d -= 1;
        } else if o.p > 0 || o.q > 0 {
            if o.q >= o.p {
                o.q -= 1;
            } else {
                o.p -= 1;
            }
        } else if o.d > 0 {
            o.d -= 1;
        } else {
            return None;
        }
        Some(spec)
    }

    /// Conventional model label, e.g. `SARIMA(1,1,1)(1,1,1)[12]`.
    pub fn model_name(&self, with_exog: bool) -> String {
        let x = if with_exog { "X" } else { "" };
        let o = self.order;
        if self.seasonal.has_terms() {
            let so = self.seasonal;
            format!(
                "SARIMA{}({},{},{})({},{},{})[{}]",
                x, o.p, o.d, o.q, so.p, so.d, so.q, so.s
            )
        } else {
            format!("ARIMA{}({},{},{})", x, o.p, o.d, o.q)
        }
    }

    fn to_model(self) -> SARIMA {
        let (o, so) = (self.order, self.seasonal);
        SARIMA::new(o.p, o.d, o.q, so.p, so.d, so.q, so.s.max(1))
    }
}

impl fmt::Display for ForecastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.order;
        write!(f, "({},{},{})", o.p, o.d, o.q)?;
        let so = self.seasonal;
        if so.has_terms() || so.s > 0 {
            write!(f, "x({},{},{},{})", so.p, so.d, so.q, so.s)?;
        }
        Ok(())
    }
}

impl FromStr for ForecastSpec {
    type Err = ForecastError;

    /// Parses `(p,d,q)` or `(p,d,q)x(P,D,Q,s)`; whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = |reason: &str| ForecastError::invalid_parameter("spec", s, reason);

        let mut parts = compact.split(['x', 'X']);
        let order = parts
            .next()
            .map(parse_tuple)
            .transpose()?
            .ok_or_else(|| invalid("missing (p,d,q)"))?;
        let seasonal = parts.next().map(parse_tuple).transpose()?;
        if parts.next().is_some() {
            return Err(invalid("expected at most two groups"));
        }

        let spec = match (order.as_slice(), seasonal.as_deref()) {
            ([p, d, q], None) => ForecastSpec::non_seasonal(*p, *d, *q),
            ([p, d, q], Some([sp, sd, sq, ss])) => {
                ForecastSpec::new((*p, *d, *q), (*sp, *sd, *sq, *ss))
            }
            ([_, _, _], Some(_)) => return Err(invalid("seasonal group needs four values")),
            _ => return Err(invalid("order group needs three values")),
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn parse_tuple(group: &str) -> Result<Vec<usize>> {
    let inner = group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .ok_or_else(|| {
            ForecastError::invalid_parameter("spec", group, "groups must be parenthesized")
        })?;
    inner
        .split(',')
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                ForecastError::invalid_parameter("spec", group, "orders must be non-negative integers")
            })
        })
        .collect()
}

/// Point forecasts with their prediction bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastPath {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// A fitted regression-with-SARIMA-errors model.
#[derive(Debug, Clone)]
pub struct SarimaFit {
    spec: ForecastSpec,
    model: SARIMA,
    regressors: Vec<String>,
    sigma2: f64,
    n_effective: usize,
}

impl SarimaFit {
    /// Fit `spec` to `series`, regressing on the columns of `exog` when given.
    ///
    /// `exog` must be dated on exactly the months of `series`. When the
    /// estimator rejects the series as too short, the next model from
    /// [`ForecastSpec::reduced`] is tried.
    pub fn fit(series: &MonthlySeries, exog: Option<&ExogFrame>, spec: &ForecastSpec) -> Result<Self> {
        spec.validate()?;
        let n = series.len();
        if n < 2 {
            return Err(ForecastError::InsufficientData { needed: 2, got: n });
        }
        let y = series.values();
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "series contains non-finite values".to_string(),
            ));
        }
        let exog = exog.filter(|x| x.n_columns() > 0);
        if let Some(x) = exog {
            check_regressors(series, x)?;
        }

        let calendar = exog.map(|x| {
            x.columns()
                .iter()
                .cloned()
                .zip(x.column_major())
                .fold(CalendarAnnotations::new(), |cal, (name, values)| {
                    cal.with_regressor(name, values)
                })
        });
        let mut builder = TimeSeriesBuilder::new()
            .timestamps(series.month_ends().into_iter().map(as_timestamp).collect())
            .values(y);
        if let Some(calendar) = calendar {
            builder = builder.calendar(calendar);
        }
        let time_series = builder.build().map_err(model_error)?;

        let mut effective = *spec;
        let model = loop {
            match fit_orders(&time_series, effective) {
                Ok(model) => break model,
                Err(ModelError::InsufficientData { needed, got, .. }) => match effective.reduced() {
                    Some(next) => {
                        debug!(spec = %effective, needed, got, "estimator rejected orders");
                        effective = next;
                    }
                    None => return Err(ForecastError::InsufficientData { needed, got }),
                },
                Err(e) => return Err(model_error(e)),
            }
        };
        if effective != *spec {
            warn!(
                requested = %spec,
                effective = %effective,
                n_obs = n,
                "series too short for requested orders, fitted reduced model"
            );
        }

        let offset = effective.residual_offset().unwrap_or(0);
        let residuals = model.residuals().unwrap_or(&[]);
        let conditional = residuals.get(offset..).unwrap_or(&[]);
        let n_effective = conditional.len();
        let sigma2 = if n_effective == 0 {
            0.0
        } else {
            conditional.iter().map(|e| e * e).sum::<f64>() / n_effective as f64
        };
        if !sigma2.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "innovation variance is not finite".to_string(),
            ));
        }

        debug!(spec = %effective, n_obs = n, n_effective, sigma2, "fitted SARIMA model");

        Ok(Self {
            spec: effective,
            model,
            regressors: exog.map(|x| x.columns().to_vec()).unwrap_or_default(),
            sigma2,
            n_effective,
        })
    }

    /// Orders actually estimated.
    pub fn spec(&self) -> &ForecastSpec {
        &self.spec
    }

    /// The underlying estimator.
    pub fn model(&self) -> &SARIMA {
        &self.model
    }

    /// Regression coefficient per covariate column, in column order.
    pub fn exog_coefficients(&self) -> Vec<(String, f64)> {
        let Some(ols) = self.model.exog_coefficients() else {
            return vec![];
        };
        self.regressors
            .iter()
            .filter_map(|name| Some((name.clone(), ols.coefficient_for(name)?)))
            .collect()
    }

    pub fn has_exog(&self) -> bool {
        !self.regressors.is_empty()
    }

    /// Innovation variance estimate (conditional residual mean square).
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Residuals entering the sum of squares.
    pub fn n_effective(&self) -> usize {
        self.n_effective
    }

    /// Gaussian conditional log-likelihood, recovered from the AIC; `None`
    /// for a perfect fit.
    pub fn log_likelihood(&self) -> Option<f64> {
        let k = self.model.spec().num_params() as f64;
        self.aic().map(|aic| k - aic / 2.0)
    }

    pub fn aic(&self) -> Option<f64> {
        self.model.aic().filter(|v| v.is_finite())
    }

    pub fn bic(&self) -> Option<f64> {
        self.model.bic().filter(|v| v.is_finite())
    }

    /// Forecast `horizon` steps with bounds at `level` coverage.
    ///
    /// `future` must carry the fitted covariate columns with `horizon` rows.
    pub fn forecast(&self, horizon: usize, future: Option<&ExogFrame>, level: f64) -> Result<ForecastPath> {
        let future = future.filter(|x| x.n_columns() > 0);
        let forecast = match future {
            None if self.regressors.is_empty() => {
                self.model.predict_with_intervals(horizon, level)
            }
            Some(x) if self.same_regressors(x) => {
                if x.len() != horizon {
                    return Err(ForecastError::CovariateMismatch(format!(
                        "every future regressor must have {} values",
                        horizon
                    )));
                }
                let future_regressors: HashMap<String, Vec<f64>> =
                    x.columns().iter().cloned().zip(x.column_major()).collect();
                self.model
                    .predict_with_exog_intervals(horizon, &future_regressors, level)
            }
            x => {
                return Err(ForecastError::CovariateMismatch(format!(
                    "model has {} regressors but {} future columns were supplied",
                    self.regressors.len(),
                    x.map_or(0, ExogFrame::n_columns)
                )));
            }
        }
        .map_err(model_error)?;

        let point = forecast.primary().to_vec();
        let lower = forecast.lower_series(0).map_err(model_error)?.to_vec();
        let upper = forecast.upper_series(0).map_err(model_error)?.to_vec();
        if point.len() != horizon || lower.len() != horizon || upper.len() != horizon {
            return Err(ForecastError::ModelFitFailure(format!(
                "estimator returned {} forecasts for a horizon of {}",
                point.len(),
                horizon
            )));
        }
        Ok(ForecastPath { point, lower, upper })
    }

    fn same_regressors(&self, frame: &ExogFrame) -> bool {
        let mut fitted = self.regressors.clone();
        let mut supplied = frame.columns().to_vec();
        fitted.sort();
        supplied.sort();
        fitted == supplied
    }
}

fn fit_orders(series: &TimeSeries, spec: ForecastSpec) -> std::result::Result<SARIMA, ModelError> {
    // The estimator indexes residuals past the end when the lag span exceeds
    // the differenced series.
    if !spec.leaves_residuals(series.len()) {
        return Err(ModelError::InsufficientData {
            needed: spec
                .diff_lags()
                .zip(spec.residual_offset())
                .and_then(|(d, r)| d.checked_add(r)?.checked_add(1))
                .unwrap_or(usize::MAX),
            got: series.len(),
            hint: None,
        });
    }
    let mut model = spec.to_model();
    model.fit(series)?;
    Ok(model)
}

fn check_regressors(series: &MonthlySeries, frame: &ExogFrame) -> Result<()> {
    if frame.month_ends() != series.month_ends() {
        return Err(ForecastError::CovariateMismatch(format!(
            "every regressor must have {} values on the series months",
            series.len()
        )));
    }
    let mut names = frame.columns().to_vec();
    names.sort();
    names.dedup();
    if names.len() != frame.n_columns() {
        return Err(ForecastError::CovariateMismatch(
            "covariate column names must be unique".to_string(),
        ));
    }
    if frame.rows().iter().flat_map(|r| r.values.iter()).any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelFitFailure(
            "regressors contain non-finite values".to_string(),
        ));
    }
    if series.len() <= frame.n_columns() + 1 {
        return Err(ForecastError::ModelFitFailure(format!(
            "{} observations cannot identify {} regressors",
            series.len(),
            frame.n_columns()
        )));
    }
    Ok(())
}

fn as_timestamp(month_end: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    month_end.and_time(NaiveTime::MIN).and_utc()
}

fn model_error(e: ModelError) -> ForecastError {
    match e {
        ModelError::InsufficientData { needed, got, .. } => {
            ForecastError::InsufficientData { needed, got }
        }
        ModelError::DimensionMismatch { expected, got } => ForecastError::CovariateMismatch(
            format!("expected {} covariate values, got {}", expected, got),
        ),
        other => ForecastError::ModelFitFailure(other.to_string()),
    }
}
