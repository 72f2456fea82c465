use std::collections::BTreeSet;

use log::info;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct NullCount {
    pub column: String,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoricalValues {
    pub column: String,
    pub values: Vec<String>,
    pub has_missing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Diagnostic snapshot of a table. Nothing here feeds later stages.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub rows: usize,
    pub columns: usize,
    /// Ascending by missing count.
    pub null_counts: Vec<NullCount>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub unique_values: Vec<CategoricalValues>,
    pub describe: Vec<NumericSummary>,
}

pub fn inspect(df: &DataFrame) -> Result<Inspection> {
    let (rows, columns) = df.shape();

    let mut null_counts: Vec<NullCount> = df
        .get_columns()
        .iter()
        .map(|s| NullCount {
            column: s.name().to_string(),
            missing: s.null_count(),
        })
        .collect();
    null_counts.sort_by_key(|c| c.missing);

    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    let mut unique_values = Vec::new();
    let mut describe = Vec::new();

    for series in df.get_columns() {
        if series.dtype() == &DataType::Utf8 {
            categorical_columns.push(series.name().to_string());
            unique_values.push(categorical_values(series)?);
        } else if series.dtype().is_numeric() {
            numeric_columns.push(series.name().to_string());
            describe.push(summarize(series)?);
        }
    }

    Ok(Inspection {
        rows,
        columns,
        null_counts,
        numeric_columns,
        categorical_columns,
        unique_values,
        describe,
    })
}

fn categorical_values(series: &Series) -> Result<CategoricalValues> {
    let values: BTreeSet<&str> = series.utf8()?.into_iter().flatten().collect();
    Ok(CategoricalValues {
        column: series.name().to_string(),
        values: values.into_iter().map(|v| v.to_string()).collect(),
        has_missing: series.null_count() > 0,
    })
}

fn summarize(series: &Series) -> Result<NumericSummary> {
    let floats = series.cast(&DataType::Float64)?;
    let count = floats.len() - floats.null_count();

    let std = floats.f64()?.std(1).filter(|_| count > 1);

    Ok(NumericSummary {
        column: series.name().to_string(),
        count,
        mean: floats.mean(),
        std,
        min: floats.min::<f64>(),
        max: floats.max::<f64>(),
    })
}

impl Inspection {
    pub fn log(&self) {
        info!("shape: ({}, {})", self.rows, self.columns);
        info!("missing values per column:");
        for c in &self.null_counts {
            info!("  {:<16} {}", c.column, c.missing);
        }
        info!(
            "numeric columns ({}): {:?}",
            self.numeric_columns.len(),
            self.numeric_columns
        );
        info!(
            "categorical columns ({}): {:?}",
            self.categorical_columns.len(),
            self.categorical_columns
        );
        for u in &self.unique_values {
            let missing = if u.has_missing { " + missing" } else { "" };
            info!("  {}: {:?}{}", u.column, u.values, missing);
        }
        for d in &self.describe {
            info!(
                "  {:<16} count={} mean={} std={} min={} max={}",
                d.column,
                d.count,
                fmt_stat(d.mean),
                fmt_stat(d.std),
                fmt_stat(d.min),
                fmt_stat(d.max)
            );
        }
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}
