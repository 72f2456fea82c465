use std::path::Path;

use log::info;
use polars::prelude::*;

use crate::config::CleaningConfig;
use crate::correlation::{correlation_matrix, drop_suggestions, redundant_pairs, DropSuggestion};
use crate::encode::{label_encode, Encoding};
use crate::error::{KidneyError, Result};
use crate::impute::impute_most_frequent;
use crate::inspect::{inspect, Inspection};
use crate::io::{drop_index_column, load_dataset, write_table, TableFormat};
use crate::normalize::normalize;
use crate::prune::drop_columns;
use crate::schema::SchemaContract;

pub struct CleanOutput {
    pub table: DataFrame,
    pub contract: SchemaContract,
}

/// Runs normalize, impute and encode, stopping short of pruning. Each stage
/// fully materialises its table before the next one starts.
pub fn encode_table(raw: DataFrame, config: &CleaningConfig) -> Result<(DataFrame, Encoding)> {
    if raw.column(&config.target_column).is_err() {
        return Err(KidneyError::ColumnNotFound(config.target_column.clone()));
    }

    let normalized = normalize(raw, config)?;
    info!("normalized {} columns", normalized.width());

    let imputed = impute_most_frequent(normalized)?;
    info!("imputed missing values in {} rows", imputed.height());

    let (encoded, encoding) = label_encode(imputed)?;
    info!("label-encoded {} columns", encoded.width());
    Ok((encoded, encoding))
}

pub fn clean_table(raw: DataFrame, config: &CleaningConfig) -> Result<CleanOutput> {
    let (encoded, encoding) = encode_table(raw, config)?;

    let table = drop_columns(encoded, &config.drop_columns)?;
    let encoding = encoding.select(&table.get_column_names());
    let contract = SchemaContract::new(&config.target_column, encoding);

    Ok(CleanOutput { table, contract })
}

/// Loads the raw file and drops its index column.
pub fn load_raw<P: AsRef<Path>>(input: P, config: &CleaningConfig) -> Result<DataFrame> {
    let df = load_dataset(input)?;
    drop_index_column(df, config.index_column.as_deref())
}

pub fn inspect_file<P: AsRef<Path>>(input: P, config: &CleaningConfig) -> Result<Inspection> {
    let df = load_raw(input, config)?;
    let report = inspect(&df)?;
    report.log();
    Ok(report)
}

/// Correlates the encoded (unpruned) columns and suggests which member of
/// each strongly correlated pair to drop.
pub fn correlation_file<P: AsRef<Path>>(
    input: P,
    config: &CleaningConfig,
    threshold: f64,
) -> Result<Vec<DropSuggestion>> {
    let raw = load_raw(input, config)?;
    let (encoded, _) = encode_table(raw, config)?;
    let matrix = correlation_matrix(&encoded)?;

    let pairs = redundant_pairs(&matrix, threshold);
    for pair in &pairs {
        info!("{} ~ {}: r = {:.2}", pair.left, pair.right, pair.r);
    }
    let suggestions = drop_suggestions(&matrix, &pairs, &config.target_column);
    for s in &suggestions {
        info!(
            "drop '{}' (r to target {:.2}), keep '{}' (r to target {:.2})",
            s.drop, s.drop_target_r, s.keep, s.keep_target_r
        );
    }
    Ok(suggestions)
}

/// Loads, cleans and writes `output` plus its schema contract beside it.
pub fn run_clean<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    format: TableFormat,
    config: &CleaningConfig,
) -> Result<SchemaContract> {
    let output = output.as_ref();
    let raw = load_raw(input, config)?;
    inspect(&raw)?.log();

    let CleanOutput {
        mut table,
        contract,
    } = clean_table(raw, config)?;

    write_table(output, &mut table, format)?;
    let contract_path = SchemaContract::path_for(output);
    contract.write(&contract_path)?;
    info!(
        "wrote {} rows x {} columns to {:?} (schema {:?})",
        table.height(),
        table.width(),
        output,
        contract_path
    );
    Ok(contract)
}
