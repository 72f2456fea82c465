use std::cmp::Ordering;

use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KidneyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

/// Code table of one column: `levels[code]` is the original value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEncoding {
    pub name: String,
    pub kind: ColumnKind,
    pub levels: Vec<String>,
}

impl ColumnEncoding {
    pub fn code_of(&self, value: &str) -> Option<u32> {
        self.levels.iter().position(|level| level == value).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    pub columns: Vec<ColumnEncoding>,
}

impl Encoding {
    pub fn column(&self, name: &str) -> Option<&ColumnEncoding> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Keeps the code tables of `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Encoding {
        Encoding {
            columns: names
                .iter()
                .filter_map(|name| self.column(name).cloned())
                .collect(),
        }
    }
}

/// Label-encodes every column independently: each value is replaced by the
/// rank of that value among the column's sorted distinct values. Numeric
/// columns are ranked too, so only their order survives.
pub fn label_encode(df: DataFrame) -> Result<(DataFrame, Encoding)> {
    let mut columns = Vec::with_capacity(df.width());
    let mut encoding = Encoding::default();

    for series in df.get_columns() {
        let missing = series.null_count();
        if missing > 0 {
            return Err(KidneyError::MissingValues {
                column: series.name().to_string(),
                count: missing,
            });
        }
        let (codes, column) = match series.dtype() {
            DataType::Utf8 => encode_text(series)?,
            _ => encode_numeric(series)?,
        };
        debug!("{}: {} levels", column.name, column.levels.len());
        columns.push(codes);
        encoding.columns.push(column);
    }

    Ok((DataFrame::new(columns)?, encoding))
}

fn encode_text(series: &Series) -> Result<(Series, ColumnEncoding)> {
    let values: Vec<&str> = series.utf8()?.into_no_null_iter().collect();
    let mut levels = values.clone();
    levels.sort_unstable();
    levels.dedup();

    let codes: Vec<u32> = values
        .iter()
        .map(|v| levels.binary_search(v).unwrap_or_default() as u32)
        .collect();

    Ok((
        Series::new(series.name(), codes),
        ColumnEncoding {
            name: series.name().to_string(),
            kind: ColumnKind::Categorical,
            levels: levels.iter().map(|l| l.to_string()).collect(),
        },
    ))
}

fn encode_numeric(series: &Series) -> Result<(Series, ColumnEncoding)> {
    let floats = series.cast(&DataType::Float64)?;
    let values: Vec<f64> = floats.f64()?.into_no_null_iter().collect();
    let mut levels = values.clone();
    levels.sort_unstable_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);

    let codes: Vec<u32> = values
        .iter()
        .map(|v| levels.binary_search_by(|l| l.total_cmp(v)).unwrap_or_default() as u32)
        .collect();

    Ok((
        Series::new(series.name(), codes),
        ColumnEncoding {
            name: series.name().to_string(),
            kind: ColumnKind::Numeric,
            levels: levels.iter().map(|l| l.to_string()).collect(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn codes(df: &DataFrame, name: &str) -> Vec<u32> {
        df.column(name).unwrap().u32().unwrap().into_no_null_iter().collect()
    }

    #[test]
    fn yes_no_sorts_no_before_yes() {
        let df = df!("dm" => &["yes", "no", "yes", "yes"]).unwrap();
        let (df, encoding) = label_encode(df).unwrap();
        assert_eq!(codes(&df, "dm"), vec![1, 0, 1, 1]);

        let dm = encoding.column("dm").unwrap();
        assert_eq!(dm.kind, ColumnKind::Categorical);
        assert_eq!(dm.levels, vec!["no", "yes"]);
        assert_eq!(dm.code_of("yes"), Some(1));
    }

    #[test]
    fn numbers_keep_rank_not_magnitude() {
        let df = df!("sc" => &[1.2, 76.0, 0.4, 1.2]).unwrap();
        let (df, encoding) = label_encode(df).unwrap();
        assert_eq!(codes(&df, "sc"), vec![1, 2, 0, 1]);
        assert_eq!(encoding.column("sc").unwrap().levels, vec!["0.4", "1.2", "76"]);
    }

    #[test]
    fn codes_are_contiguous_from_zero() {
        let df = df!(
            "pc" => &["normal", "abnormal", "normal", "normal", "abnormal"],
            "bgr" => &[121.0, 423.0, 117.0, 106.0, 74.0]
        )
        .unwrap();
        let (encoded, encoding) = label_encode(df.clone()).unwrap();
        for column in encoding.columns.iter() {
            let distinct: BTreeSet<u32> = codes(&encoded, &column.name).into_iter().collect();
            let k = df.column(&column.name).unwrap().n_unique().unwrap() as u32;
            assert_eq!(distinct, (0..k).collect::<BTreeSet<u32>>());
        }
    }

    #[test]
    fn missing_values_are_rejected() {
        let df = df!("htn" => &[Some("yes"), None]).unwrap();
        assert!(matches!(
            label_encode(df),
            Err(KidneyError::MissingValues { count: 1, .. })
        ));
    }

    #[test]
    fn select_follows_requested_order() {
        let df = df!("a" => &["x"], "b" => &[1.0], "c" => &["y"]).unwrap();
        let (_, encoding) = label_encode(df).unwrap();
        let names: Vec<String> = encoding
            .select(&["c", "a"])
            .columns
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["c", "a"]);
    }
}
