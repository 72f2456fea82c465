use std::cmp::Ordering;

use log::debug;
use polars::prelude::*;

use crate::error::{KidneyError, Result};

/// Most frequent observed value of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeValue {
    Text(String),
    Number(f64),
}

/// Replaces the missing values of every column with that column's most
/// frequent value. Ties go to the smallest value, so the result does not
/// depend on row order.
pub fn impute_most_frequent(df: DataFrame) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(df.width());
    for series in df.get_columns() {
        columns.push(fill_with_mode(series)?);
    }
    Ok(DataFrame::new(columns)?)
}

fn fill_with_mode(series: &Series) -> Result<Series> {
    let missing = series.null_count();
    if missing == 0 {
        return Ok(series.clone());
    }
    let mode = column_mode(series)?
        .ok_or_else(|| KidneyError::EmptyColumn(series.name().to_string()))?;
    debug!("{}: filling {} missing with {:?}", series.name(), missing, mode);

    let filled = match mode {
        ModeValue::Text(fill) => {
            let values: Vec<Option<String>> = series
                .utf8()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(fill.as_str()).to_string()))
                .collect();
            Series::new(series.name(), values)
        }
        ModeValue::Number(fill) => {
            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = floats
                .f64()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(fill)))
                .collect();
            Series::new(series.name(), values)
        }
    };
    Ok(filled)
}

/// Mode over the non-missing entries of `series`, or `None` when it has none.
/// Text compares by bytes, numbers by `f64::total_cmp`.
pub fn column_mode(series: &Series) -> Result<Option<ModeValue>> {
    match series.dtype() {
        DataType::Utf8 => {
            let values: Vec<&str> = series.utf8()?.into_iter().flatten().collect();
            Ok(smallest_most_frequent(values, |a, b| a.cmp(b))
                .map(|v| ModeValue::Text(v.to_string())))
        }
        _ => {
            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = floats.f64()?.into_iter().flatten().collect();
            Ok(smallest_most_frequent(values, |a, b| a.total_cmp(b)).map(ModeValue::Number))
        }
    }
}

fn smallest_most_frequent<T, F>(mut values: Vec<T>, cmp: F) -> Option<T>
where
    T: Copy,
    F: Fn(&T, &T) -> Ordering,
{
    values.sort_by(|a, b| cmp(a, b));

    let mut best: Option<(T, usize)> = None;
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && cmp(&values[start], &values[end]) == Ordering::Equal {
            end += 1;
        }
        // strictly greater, so the earliest (smallest) run keeps a tie
        if best.map_or(true, |(_, count)| end - start > count) {
            best = Some((values[start], end - start));
        }
        start = end;
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_mode_fills_missing() {
        let df = df!("dm" => &[Some("yes"), Some("no"), Some("yes"), None]).unwrap();
        let df = impute_most_frequent(df).unwrap();
        let values: Vec<Option<&str>> = df.column("dm").unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("yes"), Some("no"), Some("yes"), Some("yes")]);
    }

    #[test]
    fn all_distinct_numbers_fill_with_the_smallest() {
        let df = df!("rc" => &[Some(3.2), Some(4.1), None, Some(2.9)]).unwrap();
        let df = impute_most_frequent(df).unwrap();
        let values: Vec<Option<f64>> = df.column("rc").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(3.2), Some(4.1), Some(2.9), Some(2.9)]);
    }

    #[test]
    fn text_ties_break_lexicographically() {
        let s = Series::new("pe", &[Some("yes"), Some("no"), None]);
        assert_eq!(column_mode(&s).unwrap(), Some(ModeValue::Text("no".into())));
    }

    #[test]
    fn frequency_beats_order() {
        let s = Series::new("bp", &[Some(80.0), Some(70.0), Some(80.0), Some(50.0), None]);
        assert_eq!(column_mode(&s).unwrap(), Some(ModeValue::Number(80.0)));
    }

    #[test]
    fn no_missing_values_remain() {
        let df = df!(
            "age" => &[Some(48.0), None, None, Some(62.0), Some(62.0)],
            "pc" => &[None, Some("normal"), Some("abnormal"), Some("normal"), None]
        )
        .unwrap();
        let df = impute_most_frequent(df).unwrap();
        for series in df.get_columns() {
            assert_eq!(series.null_count(), 0, "{}", series.name());
        }
        assert_eq!(df.get_column_names(), vec!["age", "pc"]);
    }

    #[test]
    fn column_without_observations_is_fatal() {
        let df = df!("ba" => &[None::<&str>, None]).unwrap();
        let result = impute_most_frequent(df);
        assert!(matches!(result, Err(KidneyError::EmptyColumn(name)) if name == "ba"));
    }
}
