use std::collections::HashMap;

use lazy_static::lazy_static;
use polars::prelude::{DataType, Field, Schema};

pub const INDEX_COLUMN: &str = "id";
pub const TARGET_COLUMN: &str = "classification";

/// Declared dtypes of the source file, in file order. `pcv`, `wc` and `rc` are
/// measurements but arrive as text because the file carries tab-polluted
/// cells in them.
const RAW_FIELDS: [(&str, DataType); 26] = [
    ("id", DataType::Int64),
    ("age", DataType::Float64),
    ("bp", DataType::Float64),
    ("sg", DataType::Float64),
    ("al", DataType::Float64),
    ("su", DataType::Float64),
    ("rbc", DataType::Utf8),
    ("pc", DataType::Utf8),
    ("pcc", DataType::Utf8),
    ("ba", DataType::Utf8),
    ("bgr", DataType::Float64),
    ("bu", DataType::Float64),
    ("sc", DataType::Float64),
    ("sod", DataType::Float64),
    ("pot", DataType::Float64),
    ("hemo", DataType::Float64),
    ("pcv", DataType::Utf8),
    ("wc", DataType::Utf8),
    ("rc", DataType::Utf8),
    ("htn", DataType::Utf8),
    ("dm", DataType::Utf8),
    ("cad", DataType::Utf8),
    ("appet", DataType::Utf8),
    ("pe", DataType::Utf8),
    ("ane", DataType::Utf8),
    ("classification", DataType::Utf8),
];

lazy_static! {
    static ref RAW_DTYPES: HashMap<&'static str, DataType> =
        RAW_FIELDS.iter().cloned().collect();
}

pub struct KidneyRecord {
}

impl KidneyRecord {
    /// Dtype overrides for the columns of `header` that the record declares.
    /// Undeclared columns are left to inference.
    pub fn schema_for_header(header: &[String]) -> Schema {
        Schema::from_iter(header.iter().filter_map(|name| {
            RAW_DTYPES
                .get(name.as_str())
                .map(|dtype| Field::new(name, dtype.clone()))
        }))
    }

    /// Declared columns that `header` does not carry.
    pub fn missing_from_header(header: &[String]) -> Vec<&'static str> {
        RAW_FIELDS
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| !header.iter().any(|h| h == name))
            .collect()
    }
}
