//! NASA POWER daily point client.
//!
//! See <https://power.larc.nasa.gov/docs/services/api/temporal/daily/>.

use crate::covariates::{CovariateSource, MarketLocation, COVARIATE_COLUMNS};
use crate::error::{ForecastError, Result};
use crate::exog::{CovariateRow, CovariateTable};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Value POWER uses for cells it has no data for.
pub const POWER_FILL_VALUE: f64 = -999.0;

/// NASA POWER request settings.
#[derive(Debug, Clone)]
pub struct PowerConfig {
    pub base_url: String,
    /// Requested parameters; each becomes a column of the same name.
    pub parameters: Vec<String>,
    pub community: String,
    pub timeout: Duration,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://power.larc.nasa.gov/api/temporal/daily/point".to_string(),
            parameters: COVARIATE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            community: "AG".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PowerConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Blocking client for the POWER daily point endpoint.
pub struct PowerClient {
    config: PowerConfig,
    agent: ureq::Agent,
}

impl Default for PowerClient {
    fn default() -> Self {
        Self::new(PowerConfig::default())
    }
}

impl PowerClient {
    pub fn new(config: PowerConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }
}

impl CovariateSource for PowerClient {
    fn fetch(
        &self,
        location: &MarketLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CovariateTable> {
        debug!(
            market = %location.name,
            %start,
            %end,
            "requesting NASA POWER daily data"
        );
        let response = self
            .agent
            .get(&self.config.base_url)
            .query("parameters", &self.config.parameters.join(","))
            .query("community", &self.config.community)
            .query("longitude", &location.longitude.to_string())
            .query("latitude", &location.latitude.to_string())
            .query("start", &start.format("%Y%m%d").to_string())
            .query("end", &end.format("%Y%m%d").to_string())
            .query("format", "JSON")
            .call();

        let body: Value = match response {
            Ok(resp) => resp.into_json().map_err(|e| {
                ForecastError::CovariateFetchFailure(format!(
                    "NASA POWER response is not valid JSON: {}",
                    e
                ))
            })?,
            Err(ureq::Error::Status(code, _)) => {
                warn!(code, market = %location.name, "NASA POWER request rejected");
                return Err(ForecastError::CovariateFetchFailure(format!(
                    "NASA POWER returned HTTP {}",
                    code
                )));
            }
            Err(e) => {
                warn!(error = %e, market = %location.name, "NASA POWER request failed");
                return Err(ForecastError::CovariateFetchFailure(format!(
                    "NASA POWER request failed: {}",
                    e
                )));
            }
        };

        parse_power_response(&body, &self.config.parameters)
    }
}

/// Turn a POWER JSON body into a daily covariate table.
///
/// Expects `properties.parameter.<NAME>.<YYYYMMDD>` numbers; cells that are
/// absent, null or equal to the header's fill value become missing.
pub fn parse_power_response(body: &Value, parameters: &[String]) -> Result<CovariateTable> {
    let fill_value = body
        .pointer("/header/fill_value")
        .and_then(Value::as_f64)
        .unwrap_or(POWER_FILL_VALUE);
    let by_parameter = body
        .pointer("/properties/parameter")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ForecastError::CovariateFetchFailure(
                "NASA POWER response has no properties.parameter object".to_string(),
            )
        })?;

    let mut series = Vec::with_capacity(parameters.len());
    for name in parameters {
        let daily = by_parameter
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ForecastError::CovariateFetchFailure(format!(
                    "parameter '{}' missing from NASA POWER response",
                    name
                ))
            })?;
        series.push(daily);
    }

    let mut dates = BTreeSet::new();
    for daily in &series {
        for key in daily.keys() {
            let date = NaiveDate::parse_from_str(key, "%Y%m%d").map_err(|_| {
                ForecastError::CovariateFetchFailure(format!(
                    "unexpected date key '{}' in NASA POWER response",
                    key
                ))
            })?;
            dates.insert((date, key.as_str()));
        }
    }

    let rows = dates
        .into_iter()
        .map(|(date, key)| CovariateRow {
            date,
            values: series
                .iter()
                .map(|daily| {
                    daily
                        .get(key)
                        .and_then(Value::as_f64)
                        .filter(|v| (v - fill_value).abs() > f64::EPSILON)
                })
                .collect(),
        })
        .collect();

    CovariateTable::new(parameters.to_vec(), rows)
}
