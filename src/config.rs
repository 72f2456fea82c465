use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::records::{INDEX_COLUMN, TARGET_COLUMN};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cleaning: CleaningConfig,
    pub training: TrainingConfig,
}

/// Column lists driving the cleaning stages. The fix lists are deliberately
/// explicit: columns outside them are never touched by the normalizer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    pub index_column: Option<String>,
    pub target_column: String,
    pub string_fix_columns: Vec<String>,
    pub numeric_fix_columns: Vec<String>,
    pub drop_columns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            index_column: Some(INDEX_COLUMN.to_string()),
            target_column: TARGET_COLUMN.to_string(),
            string_fix_columns: to_strings(&["pcv", "wc", "rc", "dm", "cad", TARGET_COLUMN]),
            numeric_fix_columns: to_strings(&["pcv", "wc", "rc"]),
            drop_columns: to_strings(&["pcv", "bu"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation.
    pub test_size: f32,
    pub seed: u64,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_size: 0.3,
            seed: 42,
            scale_min: -1.0,
            scale_max: 1.0,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let raw = fs::read_to_string(path)?;
        Config::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config> {
        Ok(toml::from_str(raw)?)
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
