//! Versioned description of the cleaned table.
//!
//! The cleaning pipeline writes it next to its output and the trainer checks a
//! table against it before use, so both sides agree on the column order and on
//! what each integer code stands for.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::encode::{ColumnEncoding, Encoding};
use crate::error::{KidneyError, Result};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaContract {
    pub version: u32,
    pub target: String,
    pub columns: Vec<ColumnEncoding>,
}

impl SchemaContract {
    pub fn new(target: &str, encoding: Encoding) -> SchemaContract {
        SchemaContract {
            version: SCHEMA_VERSION,
            target: target.to_string(),
            columns: encoding.columns,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.column_names()
            .into_iter()
            .filter(|name| *name != self.target)
            .collect()
    }

    /// `out.csv` -> `out.csv.schema.json`
    pub fn path_for(table: &Path) -> PathBuf {
        let mut name = OsString::from(table.as_os_str());
        name.push(".schema.json");
        PathBuf::from(name)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<SchemaContract> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KidneyError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let contract: SchemaContract = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        if contract.version != SCHEMA_VERSION {
            return Err(KidneyError::SchemaMismatch {
                version: SCHEMA_VERSION,
                detail: format!("file declares version {}", contract.version),
            });
        }
        Ok(contract)
    }

    /// Checks column names, their order, and that every code has a level.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        let expected = self.column_names();
        let found = df.get_column_names();
        if expected != found {
            return Err(self.mismatch(format!("expected columns {:?}, found {:?}", expected, found)));
        }
        if !expected.contains(&self.target.as_str()) {
            return Err(self.mismatch(format!("target '{}' is not a listed column", self.target)));
        }

        for column in &self.columns {
            let series = df.column(&column.name)?;
            if series.null_count() > 0 {
                return Err(self.mismatch(format!("'{}' holds missing values", column.name)));
            }
            let codes = series.cast(&DataType::Float64)?;
            let levels = column.levels.len() as f64;
            let out_of_range = codes
                .f64()?
                .into_no_null_iter()
                .find(|code| code.fract() != 0.0 || *code < 0.0 || *code >= levels);
            if let Some(code) = out_of_range {
                return Err(self.mismatch(format!(
                    "'{}' holds code {} outside 0..{}",
                    column.name,
                    code,
                    column.levels.len()
                )));
            }
        }
        Ok(())
    }

    fn mismatch(&self, detail: String) -> KidneyError {
        KidneyError::SchemaMismatch {
            version: self.version,
            detail,
        }
    }
}
