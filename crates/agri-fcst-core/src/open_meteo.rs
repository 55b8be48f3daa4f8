//! Open-Meteo daily forecast client, used for future covariates.
//!
//! Each requested daily variable is renamed to the covariate column it
//! stands in for, so future rows line up with NASA POWER training columns.
//!
//! Only air temperature and precipitation are requested by default. Open-Meteo
//! soil variables cover the top 0-7 cm in m³/m³ and °C, while POWER's
//! `SOILM_TOT` is a profile-wide wetness fraction and `TSOIL0_10M` a 0-10 cm
//! layer, so those columns keep their last training value instead. The
//! forecast API only reaches about 16 days ahead; later months of the horizon
//! repeat the last supplied month.

use crate::covariates::{CovariateSource, MarketLocation};
use crate::error::{ForecastError, Result};
use crate::exog::{CovariateRow, CovariateTable};
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Open-Meteo request settings.
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub base_url: String,
    /// `(daily variable, covariate column)` pairs, in column order. Training
    /// columns missing here are held at their last value.
    pub variables: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        let variables = [
            ("temperature_2m_mean", "T2M"),
            ("precipitation_sum", "PRECTOTCORR"),
        ]
        .iter()
        .map(|(v, c)| (v.to_string(), c.to_string()))
        .collect();
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            variables,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenMeteoConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_variables(mut self, variables: Vec<(String, String)>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn columns(&self) -> Vec<String> {
        self.variables.iter().map(|(_, c)| c.clone()).collect()
    }
}

/// Blocking Open-Meteo client.
pub struct OpenMeteoClient {
    config: OpenMeteoConfig,
    agent: ureq::Agent,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new(OpenMeteoConfig::default())
    }
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    pub fn config(&self) -> &OpenMeteoConfig {
        &self.config
    }
}

impl CovariateSource for OpenMeteoClient {
    fn fetch(
        &self,
        location: &MarketLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CovariateTable> {
        let daily: Vec<&str> = self.config.variables.iter().map(|(v, _)| v.as_str()).collect();
        debug!(market = %location.name, %start, %end, "requesting Open-Meteo daily forecast");

        let response = self
            .agent
            .get(&self.config.base_url)
            .query("latitude", &location.latitude.to_string())
            .query("longitude", &location.longitude.to_string())
            .query("daily", &daily.join(","))
            .query("start_date", &start.format("%Y-%m-%d").to_string())
            .query("end_date", &end.format("%Y-%m-%d").to_string())
            .query("timezone", "auto")
            .call();

        let body: Value = match response {
            Ok(resp) => resp.into_json().map_err(|e| {
                ForecastError::CovariateFetchFailure(format!(
                    "Open-Meteo response is not valid JSON: {}",
                    e
                ))
            })?,
            Err(ureq::Error::Status(code, resp)) => {
                let reason = resp
                    .into_json::<Value>()
                    .ok()
                    .and_then(|v| v.get("reason").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                warn!(code, %reason, "Open-Meteo request rejected");
                return Err(ForecastError::CovariateFetchFailure(format!(
                    "Open-Meteo returned HTTP {} {}",
                    code, reason
                )));
            }
            Err(e) => {
                warn!(error = %e, "Open-Meteo request failed");
                return Err(ForecastError::CovariateFetchFailure(format!(
                    "Open-Meteo request failed: {}",
                    e
                )));
            }
        };

        parse_open_meteo_response(&body, &self.config.variables)
    }
}

/// Turn an Open-Meteo JSON body into a daily covariate table.
///
/// Expects `daily.time` as ISO dates and one equally long array per
/// requested variable; nulls become missing cells.
pub fn parse_open_meteo_response(
    body: &Value,
    variables: &[(String, String)],
) -> Result<CovariateTable> {
    let fetch_failure = |msg: String| ForecastError::CovariateFetchFailure(msg);
    let daily = body
        .get("daily")
        .ok_or_else(|| fetch_failure("Open-Meteo response has no daily block".to_string()))?;
    let times = daily
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| fetch_failure("Open-Meteo response has no daily.time array".to_string()))?;

    let dates = times
        .iter()
        .map(|t| {
            t.as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .ok_or_else(|| fetch_failure(format!("unexpected date {} in Open-Meteo response", t)))
        })
        .collect::<Result<Vec<NaiveDate>>>()?;

    let mut columns = Vec::with_capacity(variables.len());
    for (variable, _) in variables {
        let values = daily
            .get(variable)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                fetch_failure(format!("variable '{}' missing from Open-Meteo response", variable))
            })?;
        if values.len() != dates.len() {
            return Err(fetch_failure(format!(
                "variable '{}' has {} values for {} days",
                variable,
                values.len(),
                dates.len()
            )));
        }
        columns.push(values);
    }

    let rows = dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| CovariateRow {
            date,
            values: columns.iter().map(|c| c[i].as_f64()).collect(),
        })
        .collect();

    CovariateTable::new(variables.iter().map(|(_, c)| c.clone()).collect(), rows)
}
