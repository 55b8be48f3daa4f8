//! Reduction of daily price records to a monthly mean series.

use crate::calendar::{following_month_ends, month_end, months_between};
use crate::imputation::fill_nulls_interpolate;
use crate::records::{KeyMatch, PriceRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One month of the aggregated series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyPoint {
    /// Last calendar day of the month.
    pub month_end: NaiveDate,
    pub value: f64,
}

/// Monthly series, strictly increasing in `month_end`.
///
/// Months without observations are absent rather than zero-filled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonthlySeries {
    points: Vec<MonthlyPoint>,
}

impl MonthlySeries {
    /// Build a series from (date, value) pairs.
    ///
    /// Dates are snapped to their month end, sorted, and later duplicates of
    /// the same month replace earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let buckets: BTreeMap<NaiveDate, f64> = pairs
            .into_iter()
            .map(|(date, value)| (month_end(date), value))
            .collect();
        Self {
            points: buckets
                .into_iter()
                .map(|(month_end, value)| MonthlyPoint { month_end, value })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[MonthlyPoint] {
        &self.points
    }

    pub fn first(&self) -> Option<&MonthlyPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&MonthlyPoint> {
        self.points.last()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn month_ends(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.month_end).collect()
    }

    /// True when no calendar month between the first and last entry is absent.
    pub fn is_contiguous(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| months_between(w[0].month_end, w[1].month_end) == 1)
    }

    /// Keep only the months for which `keep` returns true.
    pub fn retain_months(&self, mut keep: impl FnMut(NaiveDate) -> bool) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| keep(p.month_end))
                .copied()
                .collect(),
        }
    }

    /// Contiguous copy of the series: absent interior months are inserted and
    /// filled by linear interpolation between their neighbours.
    pub fn regularized(&self) -> Self {
        let Some(first) = self.first() else {
            return Self::default();
        };
        let months = calendar_span(first.month_end, self.points.len(), |i| {
            self.points[i].month_end
        });
        let lookup: BTreeMap<NaiveDate, f64> = self
            .points
            .iter()
            .map(|p| (p.month_end, p.value))
            .collect();
        let sparse: Vec<Option<f64>> = months.iter().map(|m| lookup.get(m).copied()).collect();
        let filled = fill_nulls_interpolate(&sparse);

        Self {
            points: months
                .into_iter()
                .zip(filled)
                .map(|(month_end, value)| MonthlyPoint { month_end, value })
                .collect(),
        }
    }
}

/// All month ends from `first` up to the last of `len` sorted month ends.
pub(crate) fn calendar_span(
    first: NaiveDate,
    len: usize,
    month_at: impl Fn(usize) -> NaiveDate,
) -> Vec<NaiveDate> {
    if len == 0 {
        return vec![];
    }
    let span = months_between(first, month_at(len - 1)).max(0) as usize;
    let mut months = vec![first];
    months.extend(following_month_ends(first, span));
    months
}

/// Monthly mean prices for one (market, commodity) pair, exact key match.
pub fn aggregate(records: &[PriceRecord], market: &str, commodity: &str) -> MonthlySeries {
    aggregate_with(records, market, commodity, KeyMatch::Exact)
}

/// Monthly mean prices for one (market, commodity) pair.
pub fn aggregate_with(
    records: &[PriceRecord],
    market: &str,
    commodity: &str,
    key_match: KeyMatch,
) -> MonthlySeries {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for record in records.iter().filter(|r| {
        key_match.matches(&r.market, market) && key_match.matches(&r.commodity, commodity)
    }) {
        let bucket = buckets.entry(month_end(record.date)).or_insert((0.0, 0));
        bucket.0 += record.price;
        bucket.1 += 1;
    }

    MonthlySeries {
        points: buckets
            .into_iter()
            .map(|(month_end, (sum, count))| MonthlyPoint {
                month_end,
                value: sum / count as f64,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(date: NaiveDate, market: &str, commodity: &str, price: f64) -> PriceRecord {
        PriceRecord::new(date, market, commodity, price).unwrap()
    }

    #[test]
    fn test_aggregate_means_per_month() {
        let records = vec![
            rec(ymd(2023, 2, 3), "Salem", "Onion", 40.0),
            rec(ymd(2023, 1, 1), "Salem", "Onion", 30.0),
            rec(ymd(2023, 1, 31), "Salem", "Onion", 34.0),
            rec(ymd(2023, 1, 15), "Salem", "Banana", 99.0),
            rec(ymd(2023, 1, 15), "Erode", "Onion", 99.0),
            rec(ymd(2023, 2, 28), "Salem", "Onion", 45.0),
        ];

        let series = aggregate(&records, "Salem", "Onion");
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].month_end, ymd(2023, 1, 31));
        assert_relative_eq!(series.points()[0].value, 32.0);
        assert_eq!(series.points()[1].month_end, ymd(2023, 2, 28));
        assert_relative_eq!(series.points()[1].value, 42.5);
    }

    #[test]
    fn test_aggregate_k_months_strictly_ascending() {
        let mut records = Vec::new();
        for (i, month) in [7u32, 1, 4, 12, 9].iter().enumerate() {
            for d in 1..=3 {
                records.push(rec(ymd(2023, *month, d), "Erode", "Maize", (i * 10 + d as usize) as f64));
            }
        }
        let series = aggregate(&records, "Erode", "Maize");
        assert_eq!(series.len(), 5);
        assert!(series
            .points()
            .windows(2)
            .all(|w| w[0].month_end < w[1].month_end));
        // July was inserted first: prices 1, 2, 3.
        let july = series
            .points()
            .iter()
            .find(|p| p.month_end == ymd(2023, 7, 31))
            .unwrap();
        assert_relative_eq!(july.value, 2.0);
        assert!(!series.is_contiguous());
    }

    #[test]
    fn test_aggregate_empty_and_single_month() {
        let records = vec![rec(ymd(2023, 5, 2), "Salem", "Onion", 20.0)];
        assert!(aggregate(&records, "Salem", "Maize").is_empty());
        assert!(aggregate(&[], "Salem", "Onion").is_empty());

        let single = aggregate(&records, "Salem", "Onion");
        assert_eq!(single.len(), 1);
        assert_eq!(single.last().unwrap().month_end, ymd(2023, 5, 31));
    }

    #[test]
    fn test_aggregate_key_matching() {
        let records = vec![
            rec(ymd(2023, 1, 2), "chennai", "Banana", 30.0),
            rec(ymd(2023, 1, 3), "Chennai", "Banana", 40.0),
        ];
        assert_relative_eq!(aggregate(&records, "Chennai", "Banana").points()[0].value, 40.0);
        let normalized = aggregate_with(&records, "Chennai", "banana", KeyMatch::Normalized);
        assert_relative_eq!(normalized.points()[0].value, 35.0);
    }

    #[test]
    fn test_regularized_interpolates_absent_months() {
        let series = MonthlySeries::from_pairs(vec![
            (ymd(2023, 1, 31), 10.0),
            (ymd(2023, 4, 30), 40.0),
            (ymd(2023, 5, 31), 50.0),
        ]);
        assert!(!series.is_contiguous());

        let regular = series.regularized();
        assert!(regular.is_contiguous());
        assert_eq!(
            regular.month_ends(),
            vec![
                ymd(2023, 1, 31),
                ymd(2023, 2, 28),
                ymd(2023, 3, 31),
                ymd(2023, 4, 30),
                ymd(2023, 5, 31)
            ]
        );
        assert_relative_eq!(regular.points()[1].value, 20.0);
        assert_relative_eq!(regular.points()[2].value, 30.0);
    }

    #[test]
    fn test_from_pairs_snaps_to_month_end() {
        let series = MonthlySeries::from_pairs(vec![(ymd(2023, 3, 2), 1.0), (ymd(2023, 1, 9), 2.0)]);
        assert_eq!(series.month_ends(), vec![ymd(2023, 1, 31), ymd(2023, 3, 31)]);
        assert_eq!(series.values(), vec![2.0, 1.0]);
    }
}
