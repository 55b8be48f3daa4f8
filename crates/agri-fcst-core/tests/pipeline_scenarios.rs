//! End-to-end scenarios and properties exercised through the public API.

use agri_fcst_core::{
    aggregate, clamp, fit_and_forecast, pad_future, resolve, ExogFrame, ExogRow, ForecastError,
    ForecastPipeline, ForecastRequest, ForecastSpec, MonthlySeries, PipelineConfig, PriceRecord,
};
use approx::assert_relative_eq;
use chrono::NaiveDate;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn three_month_series() -> MonthlySeries {
    MonthlySeries::from_pairs([
        (ymd(2023, 1, 31), 40.0),
        (ymd(2023, 2, 28), 42.0),
        (ymd(2023, 3, 31), 41.0),
    ])
}

fn record(date: NaiveDate, market: &str, commodity: &str, price: f64) -> PriceRecord {
    PriceRecord::new(date, market, commodity, price).unwrap()
}

// ── Aggregation ────────────────────────────────────────────────────────

#[test]
fn test_aggregate_one_entry_per_month_with_exact_means() {
    let records = vec![
        record(ymd(2023, 3, 2), "Salem", "Onion", 30.0),
        record(ymd(2023, 1, 5), "Salem", "Onion", 10.0),
        record(ymd(2023, 1, 20), "Salem", "Onion", 20.0),
        record(ymd(2023, 1, 21), "Salem", "Tomato", 99.0),
        record(ymd(2023, 3, 30), "Salem", "Onion", 31.0),
        record(ymd(2023, 3, 31), "Salem", "Onion", 32.0),
        record(ymd(2023, 3, 15), "Erode", "Onion", 99.0),
    ];

    let series = aggregate(&records, "Salem", "Onion");
    assert_eq!(series.len(), 2);
    assert_eq!(series.month_ends(), vec![ymd(2023, 1, 31), ymd(2023, 3, 31)]);
    assert_relative_eq!(series.values()[0], 15.0);
    assert_relative_eq!(series.values()[1], 31.0);
    assert!(series.month_ends().windows(2).all(|w| w[0] < w[1]));
}

// ── Horizon ────────────────────────────────────────────────────────────

#[test]
fn test_horizon_is_constant_within_a_month() {
    let series = three_month_series();
    let horizons: Vec<usize> = (1..=30)
        .map(|d| resolve(&series, ymd(2023, 6, d)).unwrap())
        .collect();
    assert!(horizons.iter().all(|&h| h == 3));
}

#[test]
fn test_horizon_rejects_targets_not_after_last_month() {
    let series = three_month_series();
    for target in [ymd(2023, 3, 1), ymd(2023, 3, 31), ymd(2022, 12, 25)] {
        assert!(matches!(
            resolve(&series, target),
            Err(ForecastError::InvalidHorizon { .. })
        ));
    }
}

// ── Forecasting ────────────────────────────────────────────────────────

#[test]
fn test_three_month_series_forecasts_one_month() {
    let series = three_month_series();
    let months_ahead = resolve(&series, ymd(2023, 4, 15)).unwrap();
    assert_eq!(months_ahead, 1);

    let result = fit_and_forecast(&series, months_ahead, &ForecastSpec::default(), None).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.points[0].month_end, ymd(2023, 4, 30));
    assert!(result.points[0].value.is_finite());
}

#[test]
fn test_single_month_is_insufficient() {
    let series = MonthlySeries::from_pairs([(ymd(2023, 1, 31), 40.0)]);
    let err = fit_and_forecast(&series, 3, &ForecastSpec::default(), None).unwrap_err();
    assert_eq!(err, ForecastError::InsufficientData { needed: 2, got: 1 });
}

// ── Future covariates ──────────────────────────────────────────────────

fn frame(rows: &[(NaiveDate, f64)]) -> ExogFrame {
    ExogFrame::new(
        vec!["T2M".to_string()],
        rows.iter()
            .map(|&(month_end, v)| ExogRow {
                month_end,
                values: vec![v],
            })
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_future_covariates_padded_to_horizon() {
    let training = frame(&[
        (ymd(2023, 1, 31), 25.0),
        (ymd(2023, 2, 28), 26.0),
        (ymd(2023, 3, 31), 27.0),
    ]);
    let supplied = frame(&[
        (ymd(2023, 4, 30), 28.0),
        (ymd(2023, 5, 31), 29.0),
        (ymd(2023, 6, 30), 30.0),
        (ymd(2023, 7, 31), 31.0),
        (ymd(2023, 8, 31), 32.0),
        (ymd(2023, 9, 30), 33.0),
    ]);

    for count in 0..=6 {
        let partial = frame(
            &supplied
                .rows()
                .iter()
                .take(count)
                .map(|r| (r.month_end, r.values[0]))
                .collect::<Vec<_>>(),
        );
        let padded = pad_future(&partial, 5, &training).unwrap();
        assert_eq!(padded.len(), 5, "supplied {} rows", count);
    }

    let two = frame(&[(ymd(2023, 4, 30), 28.0), (ymd(2023, 5, 31), 29.0)]);
    let padded = pad_future(&two, 5, &training).unwrap();
    let values: Vec<f64> = padded.rows().iter().map(|r| r.values[0]).collect();
    assert_eq!(values, vec![28.0, 29.0, 29.0, 29.0, 29.0]);
    assert_eq!(padded.rows()[4].month_end, ymd(2023, 8, 31));
}

// ── Clamping ───────────────────────────────────────────────────────────

#[test]
fn test_clamp_stays_within_bounds() {
    let inputs = [-1e9, -5.0, 0.0, 9.99, 10.0, 55.5, 100.0, 100.01, 1e12];
    for x in inputs {
        let y = clamp(x, 10.0, 100.0);
        assert!((10.0..=100.0).contains(&y));
        if (10.0..=100.0).contains(&x) {
            assert_eq!(y, x);
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────────

#[test]
fn test_pipeline_target_inside_last_month_is_invalid() {
    let records = vec![
        record(ymd(2023, 1, 10), "Chennai", "Tomato", 40.0),
        record(ymd(2023, 2, 10), "Chennai", "Tomato", 42.0),
        record(ymd(2023, 3, 10), "Chennai", "Tomato", 41.0),
    ];
    let pipeline = ForecastPipeline::new(PipelineConfig::default());
    let request = ForecastRequest::new("Chennai", "Tomato", ymd(2023, 3, 1));
    assert!(matches!(
        pipeline.run(&records, &request),
        Err(ForecastError::InvalidHorizon { .. })
    ));
}

#[test]
fn test_pipeline_matches_keys_case_insensitively_by_default() {
    let records = vec![
        record(ymd(2023, 1, 10), "Chennai", "Tomato", 40.0),
        record(ymd(2023, 2, 10), "chennai ", "tomato", 42.0),
        record(ymd(2023, 3, 10), "CHENNAI", "Tomato", 41.0),
    ];
    let pipeline = ForecastPipeline::new(PipelineConfig::default());
    let report = pipeline
        .run(&records, &ForecastRequest::new("Chennai", "Tomato", ymd(2023, 4, 15)))
        .unwrap();
    assert_eq!(report.history.len(), 3);
    assert_eq!(report.months_ahead, 1);
    assert_eq!(report.forecast.points[0].month_end, ymd(2023, 4, 30));
}
