use log::info;
use polars::prelude::*;

use crate::error::{KidneyError, Result};

/// Removes the configured redundant columns. The list is fixed ahead of time
/// from correlation analysis; a listed column that is absent is an error.
pub fn drop_columns(mut df: DataFrame, columns: &[String]) -> Result<DataFrame> {
    for name in columns {
        if !df.get_column_names().contains(&name.as_str()) {
            return Err(KidneyError::ColumnNotFound(name.clone()));
        }
        df = df.drop(name)?;
    }
    info!("pruned {} columns, {} remain", columns.len(), df.width());
    Ok(df)
}
