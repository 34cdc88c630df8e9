use crate::error::QaError;
use crate::refine::config::Bounds;
use crate::table::Value;

/// Flag values outside the inclusive `[lower, upper]` range.
///
/// Nulls are never flagged; a non-null, non-numeric value fails the whole
/// check so bad columns surface in the QA report instead of being silently
/// coerced.
pub fn range_flag(values: &[Value], bounds: Bounds) -> Result<Vec<bool>, QaError> {
    values
        .iter()
        .map(|value| match value {
            Value::Null => Ok(false),
            other => match other.as_f64() {
                Some(x) => Ok(!bounds.contains(x)),
                None => Err(QaError::Check(format!(
                    "non-numeric value '{}' in range check",
                    other.render()
                ))),
            },
        })
        .collect()
}

/// Flag runs of consecutive identical readings of length >= `threshold`.
///
/// Every member of a qualifying run is flagged, not just the excess beyond
/// the threshold. Nulls break runs: a missing reading is not evidence of a
/// frozen sensor.
pub fn unresponsive_flag(values: &[Value], threshold: usize) -> Result<Vec<bool>, QaError> {
    if threshold == 0 {
        return Err(QaError::Check(
            "unresponsive threshold must be at least 1".to_string(),
        ));
    }
    for value in values {
        if !value.is_null() && value.as_f64().is_none() {
            return Err(QaError::Check(format!(
                "non-numeric value '{}' in unresponsive check",
                value.render()
            )));
        }
    }

    let mut flags = vec![false; values.len()];
    let mut run_start = 0;
    for i in 1..=values.len() {
        let continues = i < values.len()
            && !values[i].is_null()
            && !values[run_start].is_null()
            && values[i] == values[run_start];
        if !continues {
            let run_len = i - run_start;
            if run_len >= threshold && !values[run_start].is_null() {
                for flag in &mut flags[run_start..i] {
                    *flag = true;
                }
            }
            run_start = i;
        }
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(xs: &[f64]) -> Vec<Value> {
        xs.iter().map(|x| Value::Number(*x)).collect()
    }

    #[test]
    fn range_flag_marks_out_of_bounds_only() {
        let values = nums(&[-25.0, 0.0, 100.0, 2200.0, 2200.1]);
        let flags = range_flag(&values, Bounds::new(-20.0, 2200.0)).unwrap();
        assert_eq!(flags, vec![true, false, false, false, true]);
    }

    #[test]
    fn range_flag_skips_nulls() {
        let values = vec![Value::Number(10.0), Value::Null, Value::Number(60.0)];
        let flags = range_flag(&values, Bounds::new(0.0, 50.0)).unwrap();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn range_flag_rejects_non_numeric() {
        let values = vec![Value::Text("warm".to_string()), Value::Number(10.0)];
        let err = range_flag(&values, Bounds::new(-40.0, 50.0)).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn unresponsive_run_at_threshold_is_fully_flagged() {
        let values = nums(&[5.0, 7.0, 7.0, 7.0, 9.0]);
        let flags = unresponsive_flag(&values, 3).unwrap();
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn unresponsive_run_below_threshold_is_untouched() {
        let values = nums(&[5.0, 7.0, 7.0, 9.0]);
        let flags = unresponsive_flag(&values, 3).unwrap();
        assert_eq!(flags, vec![false, false, false, false]);
    }

    #[test]
    fn unresponsive_flags_long_runs_entirely() {
        let values = nums(&[1.0, 1.0, 1.0, 1.0, 1.0]);
        let flags = unresponsive_flag(&values, 3).unwrap();
        assert!(flags.iter().all(|f| *f));
    }

    #[test]
    fn nulls_break_unresponsive_runs() {
        let values = vec![
            Value::Number(7.0),
            Value::Number(7.0),
            Value::Null,
            Value::Number(7.0),
        ];
        let flags = unresponsive_flag(&values, 3).unwrap();
        assert_eq!(flags, vec![false, false, false, false]);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(unresponsive_flag(&nums(&[1.0]), 0).is_err());
    }
}
