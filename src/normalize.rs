use log::debug;
use polars::prelude::*;

use crate::config::CleaningConfig;
use crate::error::Result;

/// Placeholder the source uses for unknown measurements.
pub const PLACEHOLDER: &str = "?";

/// Fixes the known-dirty columns and casts every non-text column to `Float64`.
///
/// Only the columns named in `config` are cleaned; anything else passes
/// through unchanged apart from the float cast, which also turns NaN and
/// infinite readings into missing values. Applying this twice yields
/// the same table.
pub fn normalize(mut df: DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    for name in &config.string_fix_columns {
        let cleaned = match df.column(name) {
            Ok(series) if series.dtype() == &DataType::Utf8 => strip_placeholders(series)?,
            _ => continue,
        };
        debug!("{}: {} missing after text cleanup", name, cleaned.null_count());
        df.with_column(cleaned)?;
    }

    for name in &config.numeric_fix_columns {
        let parsed = match df.column(name) {
            Ok(series) if series.dtype() == &DataType::Utf8 => parse_numeric(series)?,
            _ => continue,
        };
        debug!("{}: {} missing after numeric parse", name, parsed.null_count());
        df.with_column(parsed)?;
    }

    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for name in names {
        let cast = {
            let series = df.column(&name)?;
            match series.dtype() {
                DataType::Utf8 => continue,
                _ => series.cast(&DataType::Float64)?,
            }
        };
        df.with_column(drop_non_finite(&cast)?)?;
    }

    Ok(df)
}

/// Cleans one raw cell: surrounding whitespace and embedded tabs go, and the
/// placeholder or an empty cell becomes missing.
pub fn clean_cell(raw: &str) -> Option<String> {
    let cell = raw.trim().replace('\t', "");
    if cell.is_empty() || cell == PLACEHOLDER {
        None
    } else {
        Some(cell)
    }
}

fn strip_placeholders(series: &Series) -> PolarsResult<Series> {
    let values: Vec<Option<String>> = series
        .utf8()?
        .into_iter()
        .map(|value| value.and_then(clean_cell))
        .collect();
    Ok(Series::new(series.name(), values))
}

// Unparseable residue becomes missing; the imputer fills it later.
fn parse_numeric(series: &Series) -> PolarsResult<Series> {
    let values: Vec<Option<f64>> = series
        .utf8()?
        .into_iter()
        .map(|value| value.and_then(|v| v.trim().parse::<f64>().ok()))
        .collect();
    drop_non_finite(&Series::new(series.name(), values))
}

// NaN and infinities read from a float column count as missing.
fn drop_non_finite(series: &Series) -> PolarsResult<Series> {
    let values: Vec<Option<f64>> = series
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect();
    Ok(Series::new(series.name(), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .utf8()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    fn dirty_table() -> DataFrame {
        df!(
            "age" => &[Some(48i64), Some(7), None, Some(62)],
            "rc" => &[Some("3.2"), Some(" 4.1\t"), Some("?"), Some("2.9")],
            "dm" => &[Some("yes"), Some("no"), Some("\tyes"), Some("?")],
            "classification" => &[Some("ckd"), Some("ckd\t"), Some("notckd"), Some(" notckd ")],
            "rbc" => &[Some(" normal"), None, Some("?"), Some("abnormal")]
        )
        .unwrap()
    }

    #[test]
    fn yes_no_column_keeps_values_and_marks_placeholder_missing() {
        let df = df!("dm" => &["yes", "no", "yes", "?"]).unwrap();
        let df = normalize(df, &CleaningConfig::default()).unwrap();
        assert_eq!(
            text(&df, "dm"),
            vec![Some("yes".into()), Some("no".into()), Some("yes".into()), None]
        );
    }

    #[test]
    fn dirty_numeric_text_is_parsed() {
        let df = normalize(dirty_table(), &CleaningConfig::default()).unwrap();
        assert_eq!(df.column("rc").unwrap().dtype(), &DataType::Float64);
        assert_eq!(floats(&df, "rc"), vec![Some(3.2), Some(4.1), None, Some(2.9)]);
    }

    #[test]
    fn fix_columns_hold_no_tabs_or_placeholders() {
        let df = normalize(dirty_table(), &CleaningConfig::default()).unwrap();
        for name in ["dm", "classification"] {
            for value in text(&df, name).into_iter().flatten() {
                assert!(!value.contains('\t'), "{name} kept a tab: {value:?}");
                assert_ne!(value, PLACEHOLDER);
            }
        }
        assert_eq!(
            text(&df, "classification"),
            vec![
                Some("ckd".into()),
                Some("ckd".into()),
                Some("notckd".into()),
                Some("notckd".into())
            ]
        );
    }

    #[test]
    fn unlisted_columns_pass_through() {
        let df = normalize(dirty_table(), &CleaningConfig::default()).unwrap();
        assert_eq!(
            text(&df, "rbc"),
            vec![Some(" normal".into()), None, Some("?".into()), Some("abnormal".into())]
        );
    }

    #[test]
    fn non_text_columns_become_floats() {
        let df = normalize(dirty_table(), &CleaningConfig::default()).unwrap();
        assert_eq!(df.column("age").unwrap().dtype(), &DataType::Float64);
        assert_eq!(floats(&df, "age"), vec![Some(48.0), Some(7.0), None, Some(62.0)]);
    }

    #[test]
    fn garbage_numbers_become_missing_without_error() {
        let df = df!("wc" => &["6200", "\t8400", "abc", "NaN", ""]).unwrap();
        let df = normalize(df, &CleaningConfig::default()).unwrap();
        assert_eq!(floats(&df, "wc"), vec![Some(6200.0), Some(8400.0), None, None, None]);
    }

    #[test]
    fn nan_read_into_a_float_column_becomes_missing() {
        let df = df!("age" => &[Some(48.0), Some(f64::NAN), None, Some(f64::INFINITY)]).unwrap();
        let df = normalize(df, &CleaningConfig::default()).unwrap();
        assert_eq!(floats(&df, "age"), vec![Some(48.0), None, None, None]);
        assert_eq!(df.column("age").unwrap().null_count(), 3);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let config = CleaningConfig::default();
        let once = normalize(dirty_table(), &config).unwrap();
        let twice = normalize(once.clone(), &config).unwrap();
        assert!(once.frame_equal_missing(&twice));
    }

    #[test]
    fn clean_cell_handles_sentinels() {
        assert_eq!(clean_cell("\t?"), None);
        assert_eq!(clean_cell("   "), None);
        assert_eq!(clean_cell("\t"), None);
        assert_eq!(clean_cell(" 4\t3 "), Some("43".to_string()));
    }
}
