use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use num::{Num, ToPrimitive};
use polars::export::num::NumCast;
use polars::prelude::*;
use serde::Serialize;
use smartcore::api::{Predictor, SupervisedEstimator};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::arrays::Array as _;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::metrics::accuracy;
use smartcore::metrics::distance::euclidian::Euclidian;
use smartcore::model_selection::train_test_split;
use smartcore::neighbors::knn_classifier::{KNNClassifier, KNNClassifierParameters};
use smartcore::svm::svc::{SVCParameters, SVC};
use smartcore::svm::Kernels;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};

use crate::config::TrainingConfig;
use crate::error::{KidneyError, Result};
use crate::io::read_table;
use crate::schema::SchemaContract;

type Features = DenseMatrix<f64>;
type Labels = Vec<i32>;

pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub x: Features,
    pub y: Labels,
}

/// Reads a cleaned table and checks it against its contract before use.
pub fn load_training_set<P: AsRef<Path>>(
    path: P,
    contract: &SchemaContract,
    config: &TrainingConfig,
) -> Result<TrainingSet> {
    let df = read_table(path)?;
    contract.validate(&df)?;
    training_set(&df, &contract.target, config)
}

pub fn feature_and_target(in_df: &DataFrame, target: &str) -> Result<(DataFrame, Series)> {
    let target_series = in_df
        .column(target)
        .map_err(|_| KidneyError::ColumnNotFound(target.to_string()))?
        .clone();
    let features = in_df.drop(target)?;

    Ok((features, target_series))
}

/// Splits off the target and scales every feature into the configured range.
pub fn training_set(df: &DataFrame, target: &str, config: &TrainingConfig) -> Result<TrainingSet> {
    let (features, target_series) = feature_and_target(df, target)?;
    if df.height() == 0 {
        return Err(KidneyError::EmptyTable);
    }
    for series in df.get_columns() {
        let missing = series.null_count();
        if missing > 0 {
            return Err(KidneyError::MissingValues {
                column: series.name().to_string(),
                count: missing,
            });
        }
    }

    let y: Labels = target_series
        .cast(&DataType::Int32)?
        .i32()?
        .into_no_null_iter()
        .collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(features.width());
    for series in features.get_columns() {
        let scaled = min_max_scale::<f64>(series, config.scale_min, config.scale_max)?;
        columns.push(scaled.f64()?.into_no_null_iter().collect());
    }

    Ok(TrainingSet {
        feature_names: features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        x: convert_features_to_matrix(&columns, features.height()),
        y,
    })
}

/// Linearly maps a column onto `[lower, upper]`. A constant column maps to
/// `lower`.
pub fn min_max_scale<T>(column: &Series, lower: T, upper: T) -> PolarsResult<Series>
where
    T: Num + NumCast + Copy + PartialOrd,
{
    let column = column.cast(&DataType::Float64)?;
    let (min, max) = match (column.min::<T>(), column.max::<T>()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Ok(column),
    };
    let range = max - min;
    if range == T::zero() {
        return Ok(&column * T::zero() + lower);
    }
    Ok((&column - min) / range * (upper - lower) + lower)
}

fn convert_features_to_matrix(columns: &[Vec<f64>], nrows: usize) -> Features {
    let rows: Vec<Vec<f64>> = (0..nrows)
        .map(|row| columns.iter().map(|column| column[row]).collect())
        .collect();
    DenseMatrix::from_2d_vec(&rows)
}

struct Split {
    x_train: Features,
    x_test: Features,
    y_train: Labels,
    y_test: Labels,
}

/// Counts of `(actual, predicted)` over the sorted union of seen labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<i32>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[i32], y_pred: &[i32]) -> ConfusionMatrix {
        let mut labels: Vec<i32> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (actual, predicted) in y_true.iter().zip(y_pred) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(actual), labels.binary_search(predicted)) {
                counts[i][j] += 1;
            }
        }
        ConfusionMatrix { labels, counts }
    }

    /// Per-label F1 averaged with weights equal to each label's support.
    /// Labels with no predicted or actual members score 0.
    pub fn weighted_f1(&self) -> f64 {
        let n = self.labels.len();
        let total: usize = self.counts.iter().flatten().sum();
        if total == 0 {
            return 0.0;
        }
        let mut weighted = 0.0;
        for k in 0..n {
            let tp = self.counts[k][k] as f64;
            let support: usize = self.counts[k].iter().sum();
            let predicted: usize = (0..n).map(|i| self.counts[i][k]).sum();
            let denominator = support as f64 + predicted as f64;
            let f1 = if denominator == 0.0 { 0.0 } else { 2.0 * tp / denominator };
            weighted += f1 * support as f64;
        }
        weighted / total as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub model: String,
    pub accuracy: f64,
    pub f1_score: f64,
    pub confusion: ConfusionMatrix,
    /// Fitted estimator state as JSON.
    #[serde(skip)]
    pub fitted: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub scores: Vec<ModelScore>,
}

impl TrainingReport {
    /// Highest weighted F1; the earlier model wins a tie.
    pub fn best(&self) -> Option<&ModelScore> {
        self.scores
            .iter()
            .fold(None, |best: Option<&ModelScore>, score| match best {
                Some(b) if b.f1_score >= score.f1_score => Some(b),
                _ => Some(score),
            })
    }
}

pub fn train_and_evaluate(set: &TrainingSet, config: &TrainingConfig) -> Result<TrainingReport> {
    let (x_train, x_test, y_train, y_test) =
        train_test_split(&set.x, &set.y, config.test_size, true, Some(config.seed));
    info!(
        "training on {} rows, testing on {} rows, {} features",
        y_train.len(),
        y_test.len(),
        set.feature_names.len()
    );
    let split = Split {
        x_train,
        x_test,
        y_train,
        y_test,
    };

    let mut scores = vec![
        evaluate::<DecisionTreeClassifier<f64, i32, Features, Labels>, _>(
            "Decision Tree",
            DecisionTreeClassifierParameters::default(),
            &split,
        )?,
        evaluate::<RandomForestClassifier<f64, i32, Features, Labels>, _>(
            "Random Forest",
            RandomForestClassifierParameters::default(),
            &split,
        )?,
    ];
    let gamma = scale_gamma(&split.x_train, set.feature_names.len());
    scores.extend(evaluate_svc("SVM", gamma, &split)?);
    scores.push(evaluate::<LogisticRegression<f64, i32, Features, Labels>, _>(
        "Logistic Regression",
        LogisticRegressionParameters::default(),
        &split,
    )?);
    scores.push(evaluate::<KNNClassifier<f64, i32, Features, Labels, Euclidian<f64>>, _>(
        "KNN",
        KNNClassifierParameters::default(),
        &split,
    )?);

    Ok(TrainingReport { scores })
}

fn model_error(name: &str) -> impl Fn(smartcore::error::Failed) -> KidneyError + '_ {
    move |e| KidneyError::Model {
        model: name.to_string(),
        message: e.to_string(),
    }
}

fn evaluate<E, P>(name: &str, parameters: P, split: &Split) -> Result<ModelScore>
where
    E: SupervisedEstimator<Features, Labels, P> + Serialize,
    P: Clone,
{
    info!("training model: {}", name);
    let model = E::fit(&split.x_train, &split.y_train, parameters).map_err(model_error(name))?;
    let y_pred: Labels = model.predict(&split.x_test).map_err(model_error(name))?;

    Ok(score_model(name, &split.y_test, &y_pred, serde_json::to_value(&model)?))
}

/// RBF support vector classifier. It borrows its training data, so it is
/// fitted apart from the owned estimators above, and it only separates two
/// classes: labels are mapped onto -1/+1 and back. Returns `None` when the
/// training split does not hold exactly two classes.
fn evaluate_svc(name: &str, gamma: f64, split: &Split) -> Result<Option<ModelScore>> {
    let mut classes = split.y_train.clone();
    classes.sort_unstable();
    classes.dedup();
    let (negative, positive) = match classes.as_slice() {
        [negative, positive] => (*negative, *positive),
        _ => {
            warn!("{} skipped: needs two classes, found {}", name, classes.len());
            return Ok(None);
        }
    };

    info!("training model: {} (gamma {:.4})", name, gamma);
    let y_train: Labels = split
        .y_train
        .iter()
        .map(|label| if *label == positive { 1 } else { -1 })
        .collect();
    let parameters = SVCParameters::default()
        .with_c(1.0)
        .with_kernel(Kernels::rbf().with_gamma(gamma));

    let model = SVC::fit(&split.x_train, &y_train, &parameters).map_err(model_error(name))?;
    let y_pred: Labels = model
        .predict(&split.x_test)
        .map_err(model_error(name))?
        .iter()
        .map(|v| {
            if v.to_f64().unwrap_or_default() > 0.0 {
                positive
            } else {
                negative
            }
        })
        .collect();

    Ok(Some(score_model(name, &split.y_test, &y_pred, serde_json::to_value(&model)?)))
}

/// `1 / (n_features * var(X))`, falling back to 1 for a constant matrix.
fn scale_gamma(x: &Features, n_features: usize) -> f64 {
    let values: Vec<f64> = x.iterator(0).copied().collect();
    let variance = Float64Chunked::from_vec("x", values).var(0).unwrap_or_default();
    if variance > 0.0 && n_features > 0 {
        1.0 / (n_features as f64 * variance)
    } else {
        1.0
    }
}

fn score_model(name: &str, y_test: &Labels, y_pred: &Labels, fitted: serde_json::Value) -> ModelScore {
    let confusion = ConfusionMatrix::new(y_test, y_pred);
    let score = ModelScore {
        model: name.to_string(),
        accuracy: accuracy(y_test, y_pred),
        f1_score: confusion.weighted_f1(),
        confusion,
        fitted,
    };
    info!(
        "{} - accuracy: {:.4} | f1-score: {:.4}",
        score.model, score.accuracy, score.f1_score
    );
    debug!("{} confusion matrix: {:?}", score.model, score.confusion.counts);
    score
}

#[derive(Serialize)]
struct SavedModel<'a> {
    model: &'a str,
    accuracy: f64,
    f1_score: f64,
    feature_names: &'a [String],
    estimator: &'a serde_json::Value,
}

/// Default location of a saved model: `best_model_<name>.json` in `dir`.
pub fn model_path(dir: &Path, model: &str) -> PathBuf {
    dir.join(format!("best_model_{}.json", model.replace(' ', "_")))
}

/// Writes the fitted estimator of `score` with the feature order it expects.
pub fn save_model<P: AsRef<Path>>(path: P, score: &ModelScore, feature_names: &[String]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(
        writer,
        &SavedModel {
            model: &score.model,
            accuracy: score.accuracy,
            f1_score: score.f1_score,
            feature_names,
            estimator: &score.fitted,
        },
    )?;
    Ok(())
}

#[derive(Serialize)]
struct ReportRow<'a> {
    model: &'a str,
    accuracy: f64,
    f1_score: f64,
    confusion: String,
}

pub fn write_report<P: AsRef<Path>>(path: P, report: &TrainingReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for score in &report.scores {
        writer.serialize(ReportRow {
            model: &score.model,
            accuracy: score.accuracy,
            f1_score: score.f1_score,
            confusion: format!("{:?}", score.confusion.counts),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scales_into_symmetric_range() {
        let s = Series::new("bgr", &[0u32, 5, 10]);
        let scaled = min_max_scale::<f64>(&s, -1.0, 1.0).unwrap();
        let values: Vec<f64> = scaled.f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn constant_column_maps_to_lower_bound() {
        let s = Series::new("ba", &[1u32, 1, 1]);
        let scaled = min_max_scale::<f64>(&s, -1.0, 1.0).unwrap();
        let values: Vec<f64> = scaled.f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![-1.0, -1.0, -1.0]);
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.counts, vec![vec![1, 1], vec![1, 2]]);
    }

    #[test]
    fn weighted_f1_matches_hand_computation() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        // label 0: f1 = 2*1/(2+2) = 0.5, support 2
        // label 1: f1 = 2*2/(3+3) = 2/3, support 3
        assert_relative_eq!(cm.weighted_f1(), (0.5 * 2.0 + 2.0 / 3.0 * 3.0) / 5.0);
        assert_relative_eq!(ConfusionMatrix::new(&[1, 0], &[1, 0]).weighted_f1(), 1.0);
    }

    #[test]
    fn best_prefers_f1_then_declaration_order() {
        let score = |model: &str, f1_score: f64| ModelScore {
            model: model.to_string(),
            accuracy: 0.9,
            f1_score,
            confusion: ConfusionMatrix::new(&[], &[]),
            fitted: serde_json::Value::Null,
        };
        let report = TrainingReport {
            scores: vec![score("a", 0.8), score("b", 0.95), score("c", 0.95)],
        };
        assert_eq!(report.best().unwrap().model, "b");
        assert!(TrainingReport { scores: vec![] }.best().is_none());
    }

    #[test]
    fn training_set_separates_target() {
        let df = df!(
            "sc" => &[0u32, 1, 2, 3],
            "htn" => &[1u32, 1, 0, 0],
            "classification" => &[0u32, 0, 1, 1]
        )
        .unwrap();
        let set = training_set(&df, "classification", &TrainingConfig::default()).unwrap();
        assert_eq!(set.feature_names, vec!["sc", "htn"]);
        assert_eq!(set.y, vec![0, 0, 1, 1]);
        assert!(matches!(
            training_set(&df, "target", &TrainingConfig::default()),
            Err(KidneyError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn separable_data_trains_every_model() {
        let n = 60;
        let sc: Vec<u32> = (0..n).map(|i| if i % 2 == 0 { i % 7 } else { 10 + i % 7 }).collect();
        let hemo: Vec<u32> = (0..n).map(|i| if i % 2 == 0 { 12 + i % 5 } else { i % 5 }).collect();
        let target: Vec<u32> = (0..n).map(|i| i % 2).collect();
        let df = df!("sc" => sc, "hemo" => hemo, "classification" => target).unwrap();

        let config = TrainingConfig::default();
        let set = training_set(&df, "classification", &config).unwrap();
        let report = train_and_evaluate(&set, &config).unwrap();

        let names: Vec<&str> = report.scores.iter().map(|s| s.model.as_str()).collect();
        assert_eq!(
            names,
            vec!["Decision Tree", "Random Forest", "SVM", "Logistic Regression", "KNN"]
        );
        for score in &report.scores {
            assert!((0.0..=1.0).contains(&score.accuracy), "{}", score.model);
            assert!((0.0..=1.0).contains(&score.f1_score), "{}", score.model);
            assert!(score.fitted.is_object(), "{} has no fitted state", score.model);
        }
        assert!(report.best().unwrap().f1_score > 0.9);
    }

    #[test]
    fn svm_is_skipped_for_more_than_two_classes() {
        let n = 90;
        let sc: Vec<u32> = (0..n).map(|i| (i % 3) * 20 + i % 4).collect();
        let hemo: Vec<u32> = (0..n).map(|i| (2 - i % 3) * 20 + i % 5).collect();
        let target: Vec<u32> = (0..n).map(|i| i % 3).collect();
        let df = df!("sc" => sc, "hemo" => hemo, "stage" => target).unwrap();

        let config = TrainingConfig::default();
        let set = training_set(&df, "stage", &config).unwrap();
        let report = train_and_evaluate(&set, &config).unwrap();

        assert_eq!(report.scores.len(), 4);
        assert!(report.scores.iter().all(|s| s.model != "SVM"));
    }

    #[test]
    fn header_only_table_is_rejected() {
        let df = df!(
            "sc" => Vec::<u32>::new(),
            "classification" => Vec::<u32>::new()
        )
        .unwrap();
        assert!(matches!(
            training_set(&df, "classification", &TrainingConfig::default()),
            Err(KidneyError::EmptyTable)
        ));
    }

    #[test]
    fn saved_model_names_its_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_path(dir.path(), "Random Forest");
        assert_eq!(path.file_name().unwrap(), "best_model_Random_Forest.json");

        let score = ModelScore {
            model: "Random Forest".to_string(),
            accuracy: 1.0,
            f1_score: 1.0,
            confusion: ConfusionMatrix::new(&[0, 1], &[0, 1]),
            fitted: serde_json::json!({ "trees": [] }),
        };
        let features = vec!["sc".to_string(), "hemo".to_string()];
        save_model(&path, &score, &features).unwrap();

        let saved: serde_json::Value =
            serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(saved["model"], "Random Forest");
        assert_eq!(saved["feature_names"], serde_json::json!(["sc", "hemo"]));
        assert_eq!(saved["estimator"], serde_json::json!({ "trees": [] }));
    }
}
