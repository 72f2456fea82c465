use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;

/// Pairwise Pearson correlations between the numeric columns of a table.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()` squared. `NaN` where a column is constant.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub left: String,
    pub right: String,
    pub r: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropSuggestion {
    pub drop: String,
    pub keep: String,
    pub pair_r: f64,
    pub drop_target_r: f64,
    pub keep_target_r: f64,
}

pub fn correlation_matrix(df: &DataFrame) -> Result<CorrelationMatrix> {
    let mut columns = Vec::new();
    let mut data: Vec<Vec<Option<f64>>> = Vec::new();
    for series in df.get_columns() {
        if !series.dtype().is_numeric() {
            continue;
        }
        let floats = series.cast(&DataType::Float64)?;
        columns.push(series.name().to_string());
        data.push(floats.f64()?.into_iter().collect());
    }

    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&data[i], &data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix { columns, values })
}

// Rows missing in either column are skipped.
fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

/// Distinct column pairs with `|r| >= threshold`, strongest first.
pub fn redundant_pairs(matrix: &CorrelationMatrix, threshold: f64) -> Vec<CorrelatedPair> {
    let mut pairs = Vec::new();
    for (i, left) in matrix.columns.iter().enumerate() {
        for (j, right) in matrix.columns.iter().enumerate().skip(i + 1) {
            let r = matrix.values[i][j];
            if r.abs() >= threshold {
                pairs.push(CorrelatedPair {
                    left: left.clone(),
                    right: right.clone(),
                    r,
                });
            }
        }
    }
    pairs.sort_by(|a, b| b.r.abs().total_cmp(&a.r.abs()));
    pairs
}

/// For each redundant pair, keep the member more correlated with `target`.
/// Pairs involving the target itself are skipped.
pub fn drop_suggestions(
    matrix: &CorrelationMatrix,
    pairs: &[CorrelatedPair],
    target: &str,
) -> Vec<DropSuggestion> {
    let target_r = |name: &str| {
        matrix
            .get(name, target)
            .filter(|r| !r.is_nan())
            .unwrap_or(0.0)
    };

    pairs
        .iter()
        .filter(|p| p.left != target && p.right != target)
        .map(|p| {
            let (left_r, right_r) = (target_r(p.left.as_str()), target_r(p.right.as_str()));
            let (keep, keep_r, drop, drop_r) = if left_r.abs() >= right_r.abs() {
                (&p.left, left_r, &p.right, right_r)
            } else {
                (&p.right, right_r, &p.left, left_r)
            };
            DropSuggestion {
                drop: drop.clone(),
                keep: keep.clone(),
                pair_r: p.r,
                drop_target_r: drop_r,
                keep_target_r: keep_r,
            }
        })
        .collect()
}
