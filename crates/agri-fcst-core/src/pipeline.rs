//! End-to-end request handling: aggregate, resolve the horizon, gather
//! covariates, fit, forecast and clamp.

use crate::aggregate::{aggregate_with, MonthlySeries};
use crate::calendar::{add_months, month_start};
use crate::clamp::PriceBounds;
use crate::covariates::{find_market, CovariateSource, MarketLocation};
use crate::error::{ForecastError, Result};
use crate::exog::{align_future, align_training, pad_future, resample_monthly, ExogFrame};
use crate::forecast::{ExogenousData, FitOptions, ForecastEngine, ForecastResult};
use crate::horizon::resolve;
use crate::records::{KeyMatch, PriceRecord};
use crate::sarima::ForecastSpec;
use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

/// What to do when training covariates cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovariatePolicy {
    /// Fail the request with `CovariateFetchFailure`.
    #[default]
    Require,
    /// Fit without covariates and record why in the report.
    Degrade,
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub spec: ForecastSpec,
    pub fit: FitOptions,
    pub key_match: KeyMatch,
    /// Clamp range applied to the forecast; `None` leaves it raw.
    pub bounds: Option<PriceBounds>,
    pub covariate_policy: CovariatePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spec: ForecastSpec::default(),
            fit: FitOptions::default(),
            key_match: KeyMatch::Normalized,
            bounds: None,
            covariate_policy: CovariatePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_spec(mut self, spec: ForecastSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_fit_options(mut self, fit: FitOptions) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_key_match(mut self, key_match: KeyMatch) -> Self {
        self.key_match = key_match;
        self
    }

    pub fn with_bounds(mut self, bounds: PriceBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_covariate_policy(mut self, policy: CovariatePolicy) -> Self {
        self.covariate_policy = policy;
        self
    }
}

/// One forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub market: String,
    pub commodity: String,
    pub target_date: NaiveDate,
    /// Coordinates for covariate lookups; the built-in catalog is consulted
    /// when absent.
    pub location: Option<MarketLocation>,
}

impl ForecastRequest {
    pub fn new(market: impl Into<String>, commodity: impl Into<String>, target_date: NaiveDate) -> Self {
        Self {
            market: market.into(),
            commodity: commodity.into(),
            target_date,
            location: None,
        }
    }

    pub fn with_location(mut self, location: MarketLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// How covariates took part in a forecast.
#[derive(Debug, Clone, PartialEq)]
pub enum CovariateUsage {
    /// No training source configured, or no location known for the market.
    NotRequested,
    /// Covariates were fitted.
    Used {
        columns: Vec<String>,
        training_months: usize,
        /// True when future rows repeat the last training row.
        future_held_constant: bool,
    },
    /// Training covariates were unavailable and the model was fitted without them.
    Degraded { reason: String },
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub market: String,
    pub commodity: String,
    pub target_date: NaiveDate,
    pub months_ahead: usize,
    /// Monthly series the model was fitted to.
    pub history: MonthlySeries,
    /// Unclamped forecast path.
    pub forecast: ForecastResult,
    /// Forecast path after clamping, when bounds are configured.
    pub clamped: Option<ForecastResult>,
    pub covariates: CovariateUsage,
}

impl ForecastReport {
    /// Forecast for the target month, unclamped.
    pub fn terminal_value(&self) -> Option<f64> {
        self.forecast.terminal().map(|p| p.value)
    }

    /// Forecast for the target month, clamped when bounds are configured.
    pub fn final_value(&self) -> Option<f64> {
        self.clamped
            .as_ref()
            .unwrap_or(&self.forecast)
            .terminal()
            .map(|p| p.value)
    }
}

/// Forecasting pipeline with optional covariate sources.
pub struct ForecastPipeline {
    config: PipelineConfig,
    engine: ForecastEngine,
    training_source: Option<Box<dyn CovariateSource + Send + Sync>>,
    forecast_source: Option<Box<dyn CovariateSource + Send + Sync>>,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let engine = ForecastEngine::new(config.fit.clone());
        Self {
            config,
            engine,
            training_source: None,
            forecast_source: None,
        }
    }

    /// Source of historical covariates for the training window.
    pub fn with_training_source(mut self, source: impl CovariateSource + Send + Sync + 'static) -> Self {
        self.training_source = Some(Box::new(source));
        self
    }

    /// Source of covariates for the forecast months.
    pub fn with_forecast_source(mut self, source: impl CovariateSource + Send + Sync + 'static) -> Self {
        self.forecast_source = Some(Box::new(source));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request against `records`.
    pub fn run(&self, records: &[PriceRecord], request: &ForecastRequest) -> Result<ForecastReport> {
        let series = aggregate_with(
            records,
            &request.market,
            &request.commodity,
            self.config.key_match,
        );
        if series.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 2, got: 0 });
        }
        debug!(
            market = %request.market,
            commodity = %request.commodity,
            months = series.len(),
            "aggregated monthly series"
        );
        resolve(&series, request.target_date)?;

        let location = request
            .location
            .clone()
            .or_else(|| find_market(&request.market));

        let (history, train, covariates) = match (&self.training_source, &location) {
            (Some(source), Some(location)) => {
                match self.training_covariates(source.as_ref(), location, &series) {
                    Ok((joined, frame)) => {
                        let usage = CovariateUsage::Used {
                            columns: frame.columns().to_vec(),
                            training_months: frame.len(),
                            future_held_constant: self.forecast_source.is_none(),
                        };
                        (joined, Some(frame), usage)
                    }
                    Err(e) => match self.config.covariate_policy {
                        CovariatePolicy::Require => return Err(e),
                        CovariatePolicy::Degrade => {
                            warn!(error = %e, "fitting without covariates");
                            let usage = CovariateUsage::Degraded {
                                reason: e.to_string(),
                            };
                            (series, None, usage)
                        }
                    },
                }
            }
            _ => (series, None, CovariateUsage::NotRequested),
        };

        // The inner join may drop trailing months, so the horizon follows the
        // fitted history.
        let months_ahead = resolve(&history, request.target_date)?;

        let (exog, covariates) = match train {
            Some(train) => {
                let (future, held) = self.future_covariates(location.as_ref(), months_ahead, &train)?;
                let covariates = match covariates {
                    CovariateUsage::Used {
                        columns,
                        training_months,
                        ..
                    } => CovariateUsage::Used {
                        columns,
                        training_months,
                        future_held_constant: held,
                    },
                    other => other,
                };
                (Some(ExogenousData::new(train, future)), covariates)
            }
            None => (None, covariates),
        };

        let forecast = self.engine.fit_and_forecast(
            &history,
            months_ahead,
            &self.config.spec,
            exog.as_ref(),
        )?;
        let clamped = self.config.bounds.map(|b| b.clamp_result(&forecast));

        info!(
            market = %request.market,
            commodity = %request.commodity,
            months_ahead,
            model = %forecast.model_name,
            "forecast produced"
        );

        Ok(ForecastReport {
            market: request.market.clone(),
            commodity: request.commodity.clone(),
            target_date: request.target_date,
            months_ahead,
            history,
            forecast,
            clamped,
            covariates,
        })
    }

    /// Fetch, resample and inner-join training covariates.
    fn training_covariates(
        &self,
        source: &dyn CovariateSource,
        location: &MarketLocation,
        series: &MonthlySeries,
    ) -> Result<(MonthlySeries, ExogFrame)> {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(ForecastError::InsufficientData { needed: 2, got: 0 });
        };
        let table = source.fetch(location, month_start(first.month_end), last.month_end)?;
        let monthly = resample_monthly(&table)?;
        let (joined, frame) = align_training(series, &monthly);
        if frame.is_empty() {
            return Err(ForecastError::CovariateMismatch(
                "covariates share no month with the price series".to_string(),
            ));
        }
        debug!(
            months = joined.len(),
            columns = frame.n_columns(),
            "joined covariates with price series"
        );
        Ok((joined, frame))
    }

    /// Future covariate frame and whether it was held constant.
    fn future_covariates(
        &self,
        location: Option<&MarketLocation>,
        horizon: usize,
        train: &ExogFrame,
    ) -> Result<(ExogFrame, bool)> {
        let held = || pad_future(&ExogFrame::default(), horizon, train).map(|f| (f, true));
        let (Some(source), Some(location), Some(last)) =
            (&self.forecast_source, location, train.rows().last())
        else {
            return held();
        };

        let window = last
            .month_end
            .checked_add_days(Days::new(1))
            .zip(add_months(last.month_end, horizon as u32));
        let Some((start, end)) = window else {
            return held();
        };

        match source
            .fetch(location, start, end)
            .and_then(|table| align_future(&table, horizon, train))
        {
            Ok(frame) => Ok((frame, false)),
            Err(e) => {
                warn!(error = %e, "future covariates unavailable, holding last training row");
                held()
            }
        }
    }
}
