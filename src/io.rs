use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use polars::prelude::*;
use polars_io::parquet::{ParquetReader, ParquetWriter};

use crate::error::{KidneyError, Result};
use crate::records::KidneyRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<TableFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(TableFormat::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Ok(TableFormat::Parquet),
            _ => Err(KidneyError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Reads the raw clinical file, applying the declared dtypes to the columns it
/// carries.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KidneyError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let header = read_header(path)?;
    for name in KidneyRecord::missing_from_header(&header) {
        warn!("declared column '{}' is absent from {:?}", name, path);
    }
    let dtypes = KidneyRecord::schema_for_header(&header);
    debug!("dtype overrides for {} of {} columns", dtypes.len(), header.len());

    let file = File::open(path)?;
    let df = CsvReader::new(file)
        .has_header(true)
        .with_dtypes(Some(Arc::new(dtypes)))
        .finish()?;

    info!("loaded {:?}: {} rows x {} columns", path, df.height(), df.width());
    Ok(df)
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(|name| name.to_string()).collect())
}

/// Drops the row-index column when the file carries one.
pub fn drop_index_column(df: DataFrame, index_column: Option<&str>) -> Result<DataFrame> {
    match index_column {
        Some(name) if df.get_column_names().contains(&name) => {
            debug!("dropping index column '{}'", name);
            Ok(df.drop(name)?)
        }
        _ => Ok(df),
    }
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KidneyError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;

    Ok(CsvReader::new(file).has_header(true).finish()?)
}

pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KidneyError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;

    Ok(ParquetReader::new(file).finish()?)
}

/// Reads a cleaned table, picking the reader from the file extension.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Parquet => read_parquet(path),
    }
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file).has_header(true).finish(df)?;

    Ok(())
}

pub fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_table<P: AsRef<Path>>(path: P, df: &mut DataFrame, format: TableFormat) -> Result<()> {
    match format {
        TableFormat::Csv => write_csv(path, df),
        TableFormat::Parquet => write_parquet(path, df),
    }
}
