//! Exogenous covariates: daily tables, monthly frames and their alignment
//! with the price series.

use crate::aggregate::MonthlySeries;
use crate::calendar::{following_month_ends, month_end};
use crate::error::{ForecastError, Result};
use crate::imputation::fill_nulls_locf;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// One raw covariate observation; cells may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Covariate stream as returned by a source: named columns, dated rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CovariateTable {
    columns: Vec<String>,
    rows: Vec<CovariateRow>,
}

impl CovariateTable {
    pub fn new(columns: Vec<String>, rows: Vec<CovariateRow>) -> Result<Self> {
        check_width(&columns, rows.iter().map(|r| (r.date, r.values.len())))?;
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[CovariateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One month of covariates; every cell is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ExogRow {
    pub month_end: NaiveDate,
    pub values: Vec<f64>,
}

/// Monthly covariate frame with a fixed, ordered set of named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExogFrame {
    columns: Vec<String>,
    rows: Vec<ExogRow>,
}

impl ExogFrame {
    /// Build a frame; rows must be strictly increasing by month end and as
    /// wide as `columns`.
    pub fn new(columns: Vec<String>, rows: Vec<ExogRow>) -> Result<Self> {
        check_width(&columns, rows.iter().map(|r| (r.month_end, r.values.len())))?;
        if let Some(w) = rows.windows(2).find(|w| w[0].month_end >= w[1].month_end) {
            return Err(ForecastError::CovariateMismatch(format!(
                "rows must be strictly increasing by month, found {} before {}",
                w[0].month_end, w[1].month_end
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ExogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn month_ends(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.month_end).collect()
    }

    /// Values laid out as `columns[regressor_idx][time_idx]`.
    pub fn column_major(&self) -> Vec<Vec<f64>> {
        (0..self.columns.len())
            .map(|j| self.rows.iter().map(|r| r.values[j]).collect())
            .collect()
    }

    fn retain_months(&self, keep: &BTreeSet<NaiveDate>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| keep.contains(&r.month_end))
                .cloned()
                .collect(),
        }
    }
}

fn check_width(
    columns: &[String],
    rows: impl Iterator<Item = (NaiveDate, usize)>,
) -> Result<()> {
    for (date, width) in rows {
        if width != columns.len() {
            return Err(ForecastError::CovariateMismatch(format!(
                "row {} has {} values but {} columns are declared",
                date,
                width,
                columns.len()
            )));
        }
    }
    Ok(())
}

/// Resample a daily (or irregular) covariate table to monthly means.
///
/// Rows are sorted by date and each column is forward-filled (a leading gap
/// takes the first observation) before averaging, so the frame has no
/// missing cells. A column without any observation is rejected.
pub fn resample_monthly(table: &CovariateTable) -> Result<ExogFrame> {
    if table.is_empty() {
        return ExogFrame::new(table.columns.clone(), vec![]);
    }

    let mut rows: Vec<&CovariateRow> = table.rows.iter().collect();
    rows.sort_by_key(|r| r.date);

    let mut filled_columns = Vec::with_capacity(table.columns.len());
    for (j, name) in table.columns.iter().enumerate() {
        let raw: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.values[j].filter(|v| v.is_finite()))
            .collect();
        let filled = fill_nulls_locf(&raw).ok_or_else(|| {
            ForecastError::CovariateMismatch(format!("column '{}' has no observations", name))
        })?;
        filled_columns.push(filled);
    }

    let mut buckets: BTreeMap<NaiveDate, (Vec<f64>, usize)> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let bucket = buckets
            .entry(month_end(row.date))
            .or_insert_with(|| (vec![0.0; table.columns.len()], 0));
        for (sum, column) in bucket.0.iter_mut().zip(&filled_columns) {
            *sum += column[i];
        }
        bucket.1 += 1;
    }

    let monthly = buckets
        .into_iter()
        .map(|(month_end, (sums, count))| ExogRow {
            month_end,
            values: sums.into_iter().map(|s| s / count as f64).collect(),
        })
        .collect();

    ExogFrame::new(table.columns.clone(), monthly)
}

/// Inner join of a price series with a monthly covariate frame.
///
/// Only months present in both survive; the returned series and frame share
/// the same month ends, in order.
pub fn align_training(series: &MonthlySeries, frame: &ExogFrame) -> (MonthlySeries, ExogFrame) {
    let series_months: BTreeSet<NaiveDate> = series.month_ends().into_iter().collect();
    let common: BTreeSet<NaiveDate> = frame
        .month_ends()
        .into_iter()
        .filter(|m| series_months.contains(m))
        .collect();

    (
        series.retain_months(|m| common.contains(&m)),
        frame.retain_months(&common),
    )
}

/// Future covariates for a forecast of `horizon` months.
///
/// `covariates` is a raw stream (daily or irregular) covering some of the
/// forecast window; it is resampled to monthly means and then padded with
/// [`pad_future`].
pub fn align_future(
    covariates: &CovariateTable,
    horizon: usize,
    training: &ExogFrame,
) -> Result<ExogFrame> {
    let monthly = resample_monthly(covariates)?;
    pad_future(&monthly, horizon, training)
}

/// Exactly `horizon` monthly rows dated on the month ends following the
/// last training month.
///
/// Supplied rows inside the window are used as-is (reordered to the training
/// columns); any month without one repeats the previous row, starting from
/// the last training row. A training column the supplied frame lacks keeps
/// its last training value. Rows outside the window are ignored.
pub fn pad_future(supplied: &ExogFrame, horizon: usize, training: &ExogFrame) -> Result<ExogFrame> {
    let last = training.rows.last().ok_or_else(|| {
        ForecastError::CovariateMismatch("training covariates are empty".to_string())
    })?;

    let positions: Vec<Option<usize>> = training
        .columns
        .iter()
        .map(|name| supplied.columns.iter().position(|c| c == name))
        .collect();
    if !supplied.is_empty() && positions.iter().all(Option::is_none) {
        return Err(ForecastError::CovariateMismatch(format!(
            "future covariates share no column with training (supplied: {}, training: {})",
            supplied.columns.join(", "),
            training.columns.join(", ")
        )));
    }

    let by_month: BTreeMap<NaiveDate, &ExogRow> =
        supplied.rows.iter().map(|r| (r.month_end, r)).collect();

    let mut previous = last.values.clone();
    let rows = following_month_ends(last.month_end, horizon)
        .into_iter()
        .map(|month| {
            if let Some(row) = by_month.get(&month) {
                for (value, position) in previous.iter_mut().zip(&positions) {
                    if let Some(j) = position {
                        *value = row.values[*j];
                    }
                }
            }
            ExogRow {
                month_end: month,
                values: previous.clone(),
            }
        })
        .collect();

    ExogFrame::new(training.columns.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn training_frame() -> ExogFrame {
        ExogFrame::new(
            cols(&["T2M", "PRECTOTCORR"]),
            vec![
                ExogRow { month_end: ymd(2023, 1, 31), values: vec![25.0, 1.0] },
                ExogRow { month_end: ymd(2023, 2, 28), values: vec![27.0, 0.5] },
                ExogRow { month_end: ymd(2023, 3, 31), values: vec![30.0, 0.2] },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resample_monthly_forward_fills_then_averages() {
        let table = CovariateTable::new(
            cols(&["T2M", "SOILM_TOT"]),
            vec![
                CovariateRow { date: ymd(2023, 2, 1), values: vec![Some(30.0), Some(0.4)] },
                CovariateRow { date: ymd(2023, 1, 2), values: vec![None, Some(0.2)] },
                CovariateRow { date: ymd(2023, 1, 1), values: vec![Some(20.0), None] },
                CovariateRow { date: ymd(2023, 1, 3), values: vec![None, Some(0.3)] },
                CovariateRow { date: ymd(2023, 2, 2), values: vec![Some(f64::NAN), Some(0.6)] },
            ],
        )
        .unwrap();

        let frame = resample_monthly(&table).unwrap();
        assert_eq!(frame.month_ends(), vec![ymd(2023, 1, 31), ymd(2023, 2, 28)]);
        // January: T2M forward-filled 20, 20, 20; SOILM back-filled 0.2, 0.2, 0.3.
        assert_relative_eq!(frame.rows()[0].values[0], 20.0);
        assert_relative_eq!(frame.rows()[0].values[1], 0.7 / 3.0, epsilon = 1e-12);
        // February: the NaN cell is treated as missing and carried from 30.
        assert_relative_eq!(frame.rows()[1].values[0], 30.0);
        assert_relative_eq!(frame.rows()[1].values[1], 0.5);
    }

    #[test]
    fn test_resample_rejects_empty_column() {
        let table = CovariateTable::new(
            cols(&["T2M", "TSOIL0_10M"]),
            vec![CovariateRow { date: ymd(2023, 1, 1), values: vec![Some(1.0), None] }],
        )
        .unwrap();
        let err = resample_monthly(&table).unwrap_err();
        assert!(matches!(err, ForecastError::CovariateMismatch(ref m) if m.contains("TSOIL0_10M")));
    }

    #[test]
    fn test_table_width_checked() {
        let err = CovariateTable::new(
            cols(&["T2M"]),
            vec![CovariateRow { date: ymd(2023, 1, 1), values: vec![Some(1.0), Some(2.0)] }],
        );
        assert!(matches!(err, Err(ForecastError::CovariateMismatch(_))));
    }

    #[test]
    fn test_frame_requires_increasing_months() {
        let err = ExogFrame::new(
            cols(&["T2M"]),
            vec![
                ExogRow { month_end: ymd(2023, 2, 28), values: vec![1.0] },
                ExogRow { month_end: ymd(2023, 1, 31), values: vec![1.0] },
            ],
        );
        assert!(matches!(err, Err(ForecastError::CovariateMismatch(_))));
    }

    #[test]
    fn test_align_training_inner_join() {
        let series = MonthlySeries::from_pairs(vec![
            (ymd(2022, 12, 31), 39.0),
            (ymd(2023, 1, 31), 40.0),
            (ymd(2023, 3, 31), 41.0),
        ]);
        let (joined, frame) = align_training(&series, &training_frame());
        assert_eq!(joined.month_ends(), vec![ymd(2023, 1, 31), ymd(2023, 3, 31)]);
        assert_eq!(frame.month_ends(), joined.month_ends());
        assert_eq!(frame.rows()[1].values, vec![30.0, 0.2]);
    }

    #[test]
    fn test_pad_future_repeats_last_supplied_row() {
        let training = training_frame();
        let supplied = ExogFrame::new(
            cols(&["PRECTOTCORR", "T2M"]),
            vec![
                ExogRow { month_end: ymd(2023, 4, 30), values: vec![0.1, 31.0] },
                ExogRow { month_end: ymd(2023, 5, 31), values: vec![0.0, 33.0] },
            ],
        )
        .unwrap();

        let future = pad_future(&supplied, 5, &training).unwrap();
        assert_eq!(future.len(), 5);
        assert_eq!(future.columns(), training.columns());
        assert_eq!(future.rows()[0].values, vec![31.0, 0.1]);
        for row in &future.rows()[1..] {
            assert_eq!(row.values, vec![33.0, 0.0]);
        }
        assert_eq!(future.rows()[4].month_end, ymd(2023, 8, 31));
    }

    #[test]
    fn test_pad_future_always_horizon_rows() {
        let training = training_frame();
        let many: Vec<ExogRow> = (1..=8)
            .map(|i| ExogRow {
                month_end: crate::calendar::add_months(ymd(2023, 3, 31), i).unwrap(),
                values: vec![i as f64, 0.0],
            })
            .collect();
        let many = ExogFrame::new(training.columns().to_vec(), many).unwrap();

        for supplied_rows in [0usize, 2, 4, 8] {
            let supplied =
                ExogFrame::new(training.columns().to_vec(), many.rows()[..supplied_rows].to_vec())
                    .unwrap();
            let future = pad_future(&supplied, 4, &training).unwrap();
            assert_eq!(future.len(), 4, "supplied {} rows", supplied_rows);
        }

        let held = pad_future(&ExogFrame::default(), 3, &training).unwrap();
        assert!(held.rows().iter().all(|r| r.values == vec![30.0, 0.2]));
    }

    #[test]
    fn test_pad_future_holds_columns_not_supplied() {
        let supplied = ExogFrame::new(
            cols(&["T2M"]),
            vec![ExogRow { month_end: ymd(2023, 4, 30), values: vec![31.0] }],
        )
        .unwrap();
        let training = training_frame();
        let last_precip = training.rows().last().unwrap().values[1];
        let future = pad_future(&supplied, 2, &training).unwrap();
        assert_eq!(future.columns(), training.columns());
        assert_eq!(future.rows()[0].values, vec![31.0, last_precip]);
        assert_eq!(future.rows()[1].values, vec![31.0, last_precip]);
    }

    #[test]
    fn test_pad_future_disjoint_columns() {
        let supplied = ExogFrame::new(
            cols(&["RH2M"]),
            vec![ExogRow { month_end: ymd(2023, 4, 30), values: vec![60.0] }],
        )
        .unwrap();
        let err = pad_future(&supplied, 2, &training_frame()).unwrap_err();
        assert!(matches!(err, ForecastError::CovariateMismatch(_)));
    }

    #[test]
    fn test_align_future_from_daily_rows() {
        let table = CovariateTable::new(
            cols(&["T2M", "PRECTOTCORR"]),
            vec![
                CovariateRow { date: ymd(2023, 4, 1), values: vec![Some(30.0), Some(0.0)] },
                CovariateRow { date: ymd(2023, 4, 2), values: vec![Some(32.0), None] },
            ],
        )
        .unwrap();
        let future = align_future(&table, 2, &training_frame()).unwrap();
        assert_eq!(future.month_ends(), vec![ymd(2023, 4, 30), ymd(2023, 5, 31)]);
        assert_eq!(future.rows()[0].values, vec![31.0, 0.0]);
        assert_eq!(future.rows()[1].values, vec![31.0, 0.0]);
    }

    #[test]
    fn test_column_major_layout() {
        let cm = training_frame().column_major();
        assert_eq!(cm.len(), 2);
        assert_eq!(cm[0], vec![25.0, 27.0, 30.0]);
        assert_eq!(cm[1], vec![1.0, 0.5, 0.2]);
    }
}
