//! Core library for monthly commodity price forecasting.
//!
//! Daily market prices are reduced to monthly means, optionally joined with
//! weather and soil covariates, and forecast with a seasonal ARIMA model
//! (with regression errors when covariates are present).

pub mod aggregate;
pub mod calendar;
pub mod clamp;
pub mod covariates;
pub mod error;
pub mod exog;
pub mod forecast;
pub mod horizon;
pub mod imputation;
#[cfg(feature = "http")]
pub mod open_meteo;
pub mod pipeline;
#[cfg(feature = "http")]
pub mod power;
pub mod records;
pub mod sarima;

// Re-exports for convenience
pub use aggregate::{aggregate, aggregate_with, MonthlyPoint, MonthlySeries};
pub use clamp::{clamp, PriceBounds};
pub use covariates::{find_market, market_catalog, CovariateSource, MarketLocation, COVARIATE_COLUMNS};
pub use error::{ForecastError, Result};
pub use exog::{
    align_future, align_training, pad_future, resample_monthly, CovariateRow, CovariateTable,
    ExogFrame, ExogRow,
};
pub use forecast::{
    fit_and_forecast, ExogenousData, FitOptions, ForecastEngine, ForecastPoint, ForecastResult,
};
pub use horizon::{future_month_ends, resolve};
#[cfg(feature = "http")]
pub use open_meteo::{OpenMeteoClient, OpenMeteoConfig};
pub use pipeline::{
    CovariatePolicy, CovariateUsage, ForecastPipeline, ForecastReport, ForecastRequest,
    PipelineConfig,
};
#[cfg(feature = "http")]
pub use power::{PowerClient, PowerConfig};
pub use records::{distinct_commodities, distinct_markets, KeyMatch, PriceRecord};
pub use sarima::{ArimaOrder, ForecastPath, ForecastSpec, SarimaFit, SeasonalOrder};
