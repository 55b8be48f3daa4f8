//! FFI boundary layer for the agri-fcst forecasting pipeline.
//!
//! This crate provides C-compatible functions over `agri-fcst-core`. Every
//! fallible function returns `false` and fills `out_error` on failure;
//! arrays it hands back are released with the matching `agri_free_*` call.

pub mod allocation;
pub mod conversion;
pub mod error_handling;
pub mod types;

use agri_fcst_core::{
    aggregate_with, clamp, future_month_ends, resolve, ExogFrame, ExogRow, ExogenousData,
    FitOptions, ForecastEngine, ForecastError, ForecastPipeline, ForecastRequest, ForecastResult,
    MonthlySeries, PipelineConfig, PriceBounds, PriceRecord,
};
use libc::{c_char, c_double, size_t};

use allocation::try_copy;
use conversion::{c_str_to_str, date_to_days, parse_date, to_forecast_spec};
use error_handling::{check_null_pointers, ffi_try, init_error, set_error};
use types::copy_string_to_buffer;

pub use types::*;

// ============================================================================
// Helper Functions
// ============================================================================

/// Borrow `length` elements, allowing a null pointer only when empty.
unsafe fn slice_or_empty<'a, T>(ptr: *const T, length: size_t) -> Result<&'a [T], ForecastError> {
    if length == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(ForecastError::InvalidInput(
            "null array with non-zero length".to_string(),
        ));
    }
    Ok(std::slice::from_raw_parts(ptr, length))
}

/// Build price records from columnar C arrays.
unsafe fn build_records(records: &PriceRecords) -> Result<Vec<PriceRecord>, ForecastError> {
    let dates = slice_or_empty(records.dates, records.length)?;
    let markets = slice_or_empty(records.markets, records.length)?;
    let commodities = slice_or_empty(records.commodities, records.length)?;
    let prices = slice_or_empty(records.prices, records.length)?;

    (0..records.length)
        .map(|i| {
            PriceRecord::new(
                parse_date(dates[i])?,
                c_str_to_str(markets[i], "", "market")?,
                c_str_to_str(commodities[i], "", "commodity")?,
                prices[i],
            )
        })
        .collect()
}

/// Build a monthly series; dates must name distinct months.
unsafe fn build_series(series: &MonthlySeriesArray) -> Result<MonthlySeries, ForecastError> {
    let dates = slice_or_empty(series.month_ends, series.length)?;
    let values = slice_or_empty(series.values, series.length)?;
    let pairs = dates
        .iter()
        .zip(values)
        .map(|(&d, &v)| parse_date(d).map(|date| (date, v)))
        .collect::<Result<Vec<_>, _>>()?;

    let built = MonthlySeries::from_pairs(pairs);
    if built.len() != series.length {
        return Err(ForecastError::InvalidInput(format!(
            "{} dates fall into only {} distinct months",
            series.length,
            built.len()
        )));
    }
    Ok(built)
}

/// Build training and future covariate frames from column-major arrays.
unsafe fn build_exog(
    exog: &ExogArrays,
    series: &MonthlySeries,
    horizon: usize,
) -> Result<Option<ExogenousData>, ForecastError> {
    let k = exog.n_regressors;
    if k == 0 {
        return Ok(None);
    }
    let n = series.len();
    let train = slice_or_empty(exog.train, n * k)?;
    let future = slice_or_empty(exog.future, horizon * k)?;
    let columns: Vec<String> = (1..=k).map(|j| format!("x{}", j)).collect();

    let frame = |values: &[f64], months: Vec<chrono::NaiveDate>| {
        let len = months.len();
        let rows = months
            .into_iter()
            .enumerate()
            .map(|(i, month_end)| ExogRow {
                month_end,
                values: (0..k).map(|j| values[j * len + i]).collect(),
            })
            .collect();
        ExogFrame::new(columns.clone(), rows)
    };

    let last = series
        .last()
        .map(|p| p.month_end)
        .ok_or(ForecastError::InsufficientData { needed: 2, got: 0 })?;
    let train = frame(train, series.month_ends())?;
    let future = frame(future, future_month_ends(last, horizon))?;
    Ok(Some(ExogenousData::new(train, future)))
}

/// Copy a forecast into a C result; frees partial output on allocation failure.
unsafe fn write_forecast(forecast: &ForecastResult, out: &mut PriceForecastResult) -> bool {
    let month_ends: Vec<i32> = forecast.month_ends().into_iter().map(date_to_days).collect();
    let lower: Vec<f64> = forecast.points.iter().map(|p| p.lower).collect();
    let upper: Vec<f64> = forecast.points.iter().map(|p| p.upper).collect();

    *out = PriceForecastResult::default();
    let copied = (|| {
        out.month_ends = try_copy(&month_ends)?;
        out.point_forecasts = try_copy(&forecast.values())?;
        out.lower_bounds = try_copy(&lower)?;
        out.upper_bounds = try_copy(&upper)?;
        Some(())
    })();
    if copied.is_none() {
        free_fields!(out, month_ends, point_forecasts, lower_bounds, upper_bounds);
        return false;
    }

    out.n_forecasts = forecast.len();
    copy_string_to_buffer(&forecast.model_name, &mut out.model_name);
    out.sigma2 = forecast.sigma2;
    out.aic = forecast.aic.unwrap_or(f64::NAN);
    out.bic = forecast.bic.unwrap_or(f64::NAN);
    true
}

/// Copy a monthly series into a C result; frees partial output on failure.
unsafe fn write_series(series: &MonthlySeries, out: &mut MonthlySeriesResult) -> bool {
    let month_ends: Vec<i32> = series.month_ends().into_iter().map(date_to_days).collect();

    *out = MonthlySeriesResult::default();
    let copied = (|| {
        out.month_ends = try_copy(&month_ends)?;
        out.values = try_copy(&series.values())?;
        Some(())
    })();
    if copied.is_none() {
        free_fields!(out, month_ends, values);
        return false;
    }
    out.length = series.len();
    true
}

// ============================================================================
// Aggregation and Horizon
// ============================================================================

/// Aggregate daily price records to monthly means for one market/commodity.
///
/// # Safety
/// All pointers must be valid; `records` arrays must hold `length` elements.
#[no_mangle]
pub unsafe extern "C" fn agri_aggregate_monthly(
    records: *const PriceRecords,
    market: *const c_char,
    commodity: *const c_char,
    key_match: KeyMatchMode,
    out_result: *mut MonthlySeriesResult,
    out_error: *mut AgriError,
) -> bool {
    init_error(out_error);
    if check_null_pointers(
        out_error,
        &[
            records as *const core::ffi::c_void,
            market as *const core::ffi::c_void,
            commodity as *const core::ffi::c_void,
            out_result as *const core::ffi::c_void,
        ],
    ) {
        return false;
    }

    let Some(series) = ffi_try(out_error, || {
        let records = build_records(&*records)?;
        Ok(aggregate_with(
            &records,
            c_str_to_str(market, "", "market")?,
            c_str_to_str(commodity, "", "commodity")?,
            key_match.into(),
        ))
    }) else {
        return false;
    };

    if !write_series(&series, &mut *out_result) {
        set_error(out_error, ErrorCode::AllocationError, "Memory allocation failed");
        return false;
    }
    true
}

/// Number of months between the last month of `series` and `target_date`.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn agri_resolve_horizon(
    series: *const MonthlySeriesArray,
    target_date: i32,
    out_months_ahead: *mut size_t,
    out_error: *mut AgriError,
) -> bool {
    init_error(out_error);
    if check_null_pointers(
        out_error,
        &[
            series as *const core::ffi::c_void,
            out_months_ahead as *const core::ffi::c_void,
        ],
    ) {
        return false;
    }

    match ffi_try(out_error, || resolve(&build_series(&*series)?, parse_date(target_date)?)) {
        Some(months) => {
            *out_months_ahead = months;
            true
        }
        None => false,
    }
}

// ============================================================================
// Forecasting
// ============================================================================

/// Fit a SARIMA(X) model to a monthly series and forecast `horizon` months.
///
/// `exog` may be null for a model without covariates.
///
/// # Safety
/// `series`, `options` and `out_result` must be valid; `exog` must be null or
/// valid with arrays of the documented sizes.
#[no_mangle]
pub unsafe extern "C" fn agri_forecast_prices(
    series: *const MonthlySeriesArray,
    horizon: size_t,
    options: *const SarimaOptions,
    exog: *const ExogArrays,
    out_result: *mut PriceForecastResult,
    out_error: *mut AgriError,
) -> bool {
    init_error(out_error);
    if check_null_pointers(
        out_error,
        &[
            series as *const core::ffi::c_void,
            options as *const core::ffi::c_void,
            out_result as *const core::ffi::c_void,
        ],
    ) {
        return false;
    }

    let Some(forecast) = ffi_try(out_error, || {
        let opts = &*options;
        let series = build_series(&*series)?;
        let spec = to_forecast_spec(opts)?;
        let exog = match exog.as_ref() {
            Some(x) => build_exog(x, &series, horizon)?,
            None => None,
        };
        let engine =
            ForecastEngine::new(FitOptions::default().with_confidence_level(opts.confidence_level));
        engine.fit_and_forecast(&series, horizon, &spec, exog.as_ref())
    }) else {
        return false;
    };

    if !write_forecast(&forecast, &mut *out_result) {
        set_error(out_error, ErrorCode::AllocationError, "Memory allocation failed");
        return false;
    }
    true
}

/// Aggregate records, resolve the horizon for `target_date` and forecast,
/// without covariates.
///
/// # Safety
/// All pointers must be valid; `records` arrays must hold `length` elements.
#[no_mangle]
pub unsafe extern "C" fn agri_forecast_records(
    records: *const PriceRecords,
    market: *const c_char,
    commodity: *const c_char,
    target_date: i32,
    options: *const SarimaOptions,
    out_result: *mut PriceForecastResult,
    out_error: *mut AgriError,
) -> bool {
    init_error(out_error);
    if check_null_pointers(
        out_error,
        &[
            records as *const core::ffi::c_void,
            market as *const core::ffi::c_void,
            commodity as *const core::ffi::c_void,
            options as *const core::ffi::c_void,
            out_result as *const core::ffi::c_void,
        ],
    ) {
        return false;
    }

    let Some(forecast) = ffi_try(out_error, || {
        let opts = &*options;
        let records = build_records(&*records)?;
        let config = PipelineConfig::default()
            .with_spec(to_forecast_spec(opts)?)
            .with_fit_options(FitOptions::default().with_confidence_level(opts.confidence_level));
        let request = ForecastRequest::new(
            c_str_to_str(market, "", "market")?,
            c_str_to_str(commodity, "", "commodity")?,
            parse_date(target_date)?,
        );
        ForecastPipeline::new(config)
            .run(&records, &request)
            .map(|report| report.forecast)
    }) else {
        return false;
    };

    if !write_forecast(&forecast, &mut *out_result) {
        set_error(out_error, ErrorCode::AllocationError, "Memory allocation failed");
        return false;
    }
    true
}

// ============================================================================
// Clamping
// ============================================================================

/// Clamp a single value into `[min_bound, max_bound]`.
#[no_mangle]
pub extern "C" fn agri_clamp(value: c_double, min_bound: c_double, max_bound: c_double) -> c_double {
    clamp(value, min_bound, max_bound)
}

/// Clamp point forecasts and interval bounds of a result in place.
///
/// # Safety
/// `result` must point to a result filled by this library.
#[no_mangle]
pub unsafe extern "C" fn agri_clamp_forecast(
    result: *mut PriceForecastResult,
    min_bound: c_double,
    max_bound: c_double,
    out_error: *mut AgriError,
) -> bool {
    init_error(out_error);
    if check_null_pointers(out_error, &[result as *const core::ffi::c_void]) {
        return false;
    }

    let Some(bounds) = ffi_try(out_error, || PriceBounds::new(min_bound, max_bound)) else {
        return false;
    };

    let r = &mut *result;
    for array in [r.point_forecasts, r.lower_bounds, r.upper_bounds] {
        if array.is_null() {
            continue;
        }
        for v in std::slice::from_raw_parts_mut(array, r.n_forecasts) {
            *v = bounds.clamp(*v);
        }
    }
    true
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a monthly series result.
///
/// # Safety
/// `result` must be null or filled by `agri_aggregate_monthly`.
#[no_mangle]
pub unsafe extern "C" fn agri_free_monthly_series(result: *mut MonthlySeriesResult) {
    if result.is_null() {
        return;
    }
    let r = &mut *result;
    free_fields!(r, month_ends, values);
    r.length = 0;
}

/// Free a forecast result.
///
/// # Safety
/// `result` must be null or filled by a forecast function of this library.
#[no_mangle]
pub unsafe extern "C" fn agri_free_forecast_result(result: *mut PriceForecastResult) {
    if result.is_null() {
        return;
    }
    let r = &mut *result;
    free_fields!(r, month_ends, point_forecasts, lower_bounds, upper_bounds);
    r.n_forecasts = 0;
}

/// Library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn agri_fcst_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}
