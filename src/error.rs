use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KidneyError {
    #[error("input file not found: {path:?}")]
    InputNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("column '{0}' was not found in the table")]
    ColumnNotFound(String),

    #[error("column '{0}' has no observed values, so it has no most frequent value")]
    EmptyColumn(String),

    #[error("table has no rows")]
    EmptyTable,

    #[error("column '{column}' still holds {count} missing values")]
    MissingValues { column: String, count: usize },

    #[error("table does not match schema contract v{version}: {detail}")]
    SchemaMismatch { version: u32, detail: String },

    #[error("unsupported file format for {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("model '{model}' failed: {message}")]
    Model { model: String, message: String },
}

pub type Result<T> = std::result::Result<T, KidneyError>;
