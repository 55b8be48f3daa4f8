//! Missing-value filling for monthly prices and covariate columns.

/// Carry the last observed value forward over missing cells.
///
/// Cells before the first observation stay missing.
pub fn fill_nulls_forward(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Carry the next observed value backward over missing cells.
///
/// Cells after the last observation stay missing.
pub fn fill_nulls_backward(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = fill_nulls_forward(&values.iter().rev().copied().collect::<Vec<_>>());
    filled.reverse();
    filled
}

/// Forward fill, then back-fill any leading gap.
///
/// Returns `None` when the column has no observation at all.
pub fn fill_nulls_locf(values: &[Option<f64>]) -> Option<Vec<f64>> {
    fill_nulls_backward(&fill_nulls_forward(values))
        .into_iter()
        .collect()
}

/// Linear interpolation between observed neighbours.
///
/// Leading and trailing gaps take the nearest observed value; an all-missing
/// input yields NaN everywhere.
pub fn fill_nulls_interpolate(values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();

    let (Some(&(_, first_val)), Some(&(last_idx, last_val))) =
        (known.first(), known.last())
    else {
        return vec![f64::NAN; values.len()];
    };

    let mut result = vec![first_val; values.len()];
    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        let slope = (v1 - v0) / (i1 - i0) as f64;
        for (offset, slot) in result[i0..i1].iter_mut().enumerate() {
            *slot = v0 + slope * offset as f64;
        }
    }
    for slot in result.iter_mut().skip(last_idx) {
        *slot = last_val;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fill_nulls_forward() {
        let values = vec![None, Some(1.0), None, None, Some(4.0), None];
        assert_eq!(
            fill_nulls_forward(&values),
            vec![None, Some(1.0), Some(1.0), Some(1.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn test_fill_nulls_backward() {
        let values = vec![None, Some(2.0), None, Some(4.0), None];
        assert_eq!(
            fill_nulls_backward(&values),
            vec![Some(2.0), Some(2.0), Some(4.0), Some(4.0), None]
        );
    }

    #[test]
    fn test_fill_nulls_locf() {
        let values = vec![None, Some(2.0), None, Some(5.0), None];
        assert_eq!(fill_nulls_locf(&values), Some(vec![2.0, 2.0, 2.0, 5.0, 5.0]));
        assert_eq!(fill_nulls_locf(&[None, None]), None);
        assert_eq!(fill_nulls_locf(&[]), Some(vec![]));
    }

    #[test]
    fn test_fill_nulls_interpolate() {
        let values = vec![None, Some(1.0), None, None, Some(4.0), None];
        let result = fill_nulls_interpolate(&values);
        assert_relative_eq!(result[0], 1.0);
        assert_relative_eq!(result[1], 1.0);
        assert_relative_eq!(result[2], 2.0);
        assert_relative_eq!(result[3], 3.0);
        assert_relative_eq!(result[4], 4.0);
        assert_relative_eq!(result[5], 4.0);
    }

    #[test]
    fn test_fill_nulls_interpolate_all_missing() {
        let result = fill_nulls_interpolate(&[None, None]);
        assert!(result.iter().all(|v| v.is_nan()));
        assert!(fill_nulls_interpolate(&[]).is_empty());
    }
}
