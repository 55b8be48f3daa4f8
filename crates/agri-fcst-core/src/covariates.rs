//! Covariate sources and market locations.

use crate::error::Result;
use crate::exog::{CovariateRow, CovariateTable};
use crate::records::normalize_key;
use chrono::NaiveDate;

/// Daily weather and soil variables used as regressors, in column order.
pub const COVARIATE_COLUMNS: [&str; 4] = ["T2M", "PRECTOTCORR", "SOILM_TOT", "TSOIL0_10M"];

/// A market's name and coordinates (decimal degrees).
#[derive(Debug, Clone, PartialEq)]
pub struct MarketLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl MarketLocation {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Built-in markets: (name, latitude, longitude).
const TAMIL_NADU_MARKETS: [(&str, f64, f64); 5] = [
    ("Coimbatore", 11.0, 76.9),
    ("Chennai", 13.08, 80.27),
    ("Tiruppur", 11.1, 77.3),
    ("Salem", 11.65, 78.15),
    ("Erode", 11.34, 77.72),
];

/// The built-in Tamil Nadu market catalog.
pub fn market_catalog() -> Vec<MarketLocation> {
    TAMIL_NADU_MARKETS
        .iter()
        .map(|&(name, lat, lon)| MarketLocation::new(name, lat, lon))
        .collect()
}

/// Catalog entry for `name`, compared after trimming and lower-casing.
pub fn find_market(name: &str) -> Option<MarketLocation> {
    let wanted = normalize_key(name);
    market_catalog()
        .into_iter()
        .find(|m| normalize_key(&m.name) == wanted)
}

/// Anything that can supply daily covariates for a location and date range.
///
/// Implementations return rows dated within `[start, end]` (inclusive); the
/// table may contain missing cells but not invented values.
pub trait CovariateSource {
    fn fetch(&self, location: &MarketLocation, start: NaiveDate, end: NaiveDate)
        -> Result<CovariateTable>;
}

/// A pre-fetched table serves as a source; the location is ignored.
impl CovariateSource for CovariateTable {
    fn fetch(
        &self,
        _location: &MarketLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CovariateTable> {
        let rows: Vec<CovariateRow> = self
            .rows()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect();
        CovariateTable::new(self.columns().to_vec(), rows)
    }
}
