//! Daily price records and selection keys.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// One observed price for a (date, market, commodity) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub market: String,
    pub commodity: String,
    /// Price per unit (INR/kg in the bundled markets); non-negative.
    pub price: f64,
}

impl PriceRecord {
    /// Create a record, rejecting negative or non-finite prices.
    pub fn new(
        date: NaiveDate,
        market: impl Into<String>,
        commodity: impl Into<String>,
        price: f64,
    ) -> Result<Self> {
        if !price.is_finite() || price < 0.0 {
            return Err(ForecastError::InvalidInput(format!(
                "price must be a non-negative finite number, got {}",
                price
            )));
        }
        Ok(Self {
            date,
            market: market.into(),
            commodity: commodity.into(),
            price,
        })
    }
}

/// How market and commodity filter keys are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMatch {
    /// Byte-for-byte, case-sensitive comparison.
    #[default]
    Exact,
    /// Compare after trimming surrounding whitespace and lower-casing, so
    /// "Chennai", "chennai " and "CHENNAI" select the same market.
    Normalized,
}

impl KeyMatch {
    /// Check whether a record key matches the requested key.
    pub fn matches(&self, record_key: &str, wanted: &str) -> bool {
        match self {
            KeyMatch::Exact => record_key == wanted,
            KeyMatch::Normalized => normalize_key(record_key) == normalize_key(wanted),
        }
    }
}

/// Canonical form of a filter key under [`KeyMatch::Normalized`].
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Sorted, de-duplicated market names.
pub fn distinct_markets(records: &[PriceRecord]) -> Vec<String> {
    distinct(records.iter().map(|r| r.market.as_str()))
}

/// Sorted, de-duplicated commodity names.
pub fn distinct_commodities(records: &[PriceRecord]) -> Vec<String> {
    distinct(records.iter().map(|r| r.commodity.as_str()))
}

fn distinct<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = keys.map(String::from).collect();
    out.sort();
    out.dedup();
    out
}
