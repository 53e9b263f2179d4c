use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, EnumIter, EnumString};
use validator::{Validate, ValidationError};

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureConfig {
    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    #[validate(range(min = 1))]
    pub max_features: usize,

    /// Minimum document frequency for a term to be retained
    #[serde(default = "default_min_doc_freq")]
    #[validate(range(min = 1))]
    pub min_doc_freq: usize,

    /// Drop English stop words before building n-grams
    #[serde(default = "default_true")]
    pub stop_words: bool,

    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            min_doc_freq: default_min_doc_freq(),
            stop_words: true,
            ngram_range: default_ngram_range(), // Unigrams and bigrams
        }
    }
}

impl FeatureConfig {
    /// Range checks the derive cannot express
    pub fn check_ngram_range(&self) -> std::result::Result<(), String> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!(
                "invalid ngram_range ({}, {}): expected 1 <= min <= max",
                min_n, max_n
            ));
        }
        Ok(())
    }
}

/// Classifier family enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    /// Linear probabilistic classifier
    LogisticRegression,

    /// Linear margin classifier
    LinearSvm,

    /// Bagged decision trees
    RandomForest,
}

impl ModelFamily {
    /// Stable snake_case key used in config files and reports
    pub fn key(&self) -> &str {
        self.as_ref()
    }

    /// Whether fitted models of this family expose class probabilities
    pub fn has_probabilities(&self) -> bool {
        !matches!(self, ModelFamily::LinearSvm)
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::LogisticRegression => write!(f, "Logistic Regression"),
            ModelFamily::LinearSvm => write!(f, "Linear SVM"),
            ModelFamily::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// Solver variant for logistic regression
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogisticSolver {
    /// Multinomial softmax fitted with L-BFGS
    Lbfgs,

    /// One-vs-rest binary models
    Liblinear,
}

impl std::fmt::Display for LogisticSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Hyperparameters of one fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperParameters {
    LogisticRegression {
        /// Inverse regularization strength
        c: f64,
        solver: LogisticSolver,
    },
    LinearSvm {
        c: f64,
    },
    RandomForest {
        n_trees: usize,
        max_depth: Option<u16>,
        /// Share of vocabulary columns each tree sees
        feature_fraction: f64,
        seed: u64,
    },
}

impl HyperParameters {
    /// Family these parameters belong to
    pub fn family(&self) -> ModelFamily {
        match self {
            HyperParameters::LogisticRegression { .. } => ModelFamily::LogisticRegression,
            HyperParameters::LinearSvm { .. } => ModelFamily::LinearSvm,
            HyperParameters::RandomForest { .. } => ModelFamily::RandomForest,
        }
    }

    /// Flat key/value view for reports
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        match self {
            HyperParameters::LogisticRegression { c, solver } => {
                map.insert("C".to_string(), c.to_string());
                map.insert("solver".to_string(), solver.to_string());
            }
            HyperParameters::LinearSvm { c } => {
                map.insert("C".to_string(), c.to_string());
            }
            HyperParameters::RandomForest {
                n_trees,
                max_depth,
                feature_fraction,
                seed,
            } => {
                map.insert("n_estimators".to_string(), n_trees.to_string());
                map.insert(
                    "max_depth".to_string(),
                    max_depth.map_or_else(|| "none".to_string(), |d| d.to_string()),
                );
                map.insert("feature_fraction".to_string(), feature_fraction.to_string());
                map.insert("seed".to_string(), seed.to_string());
            }
        }
        map
    }
}

impl std::fmt::Display for HyperParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .to_map()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Random forest settings shared by selection and tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ForestConfig {
    /// Number of bagged trees
    #[serde(default = "default_n_trees")]
    #[validate(range(min = 1))]
    pub n_trees: usize,

    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<u16>,

    /// Share of vocabulary columns sampled per tree
    #[serde(default = "default_feature_fraction")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub feature_fraction: f64,

    /// Base seed; tree `t` uses `seed + t`
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: None,
            feature_fraction: default_feature_fraction(),
            seed: default_seed(),
        }
    }
}

/// Model selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SelectionConfig {
    /// Candidate families, in training order
    #[serde(default = "default_families")]
    #[validate(length(min = 1))]
    pub families: Vec<ModelFamily>,

    /// Logistic regression C
    #[serde(default = "default_c")]
    #[validate(range(exclusive_min = 0.0))]
    pub logistic_c: f64,

    /// Logistic regression solver
    #[serde(default = "default_solver")]
    pub logistic_solver: LogisticSolver,

    /// Linear SVM C
    #[serde(default = "default_c")]
    #[validate(range(exclusive_min = 0.0))]
    pub svm_c: f64,

    /// Random forest settings
    #[serde(default)]
    #[validate(nested)]
    pub forest: ForestConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            families: default_families(),
            logistic_c: default_c(),
            logistic_solver: default_solver(),
            svm_c: default_c(),
            forest: ForestConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Default hyperparameters for one family
    pub fn params_for(&self, family: ModelFamily) -> HyperParameters {
        match family {
            ModelFamily::LogisticRegression => HyperParameters::LogisticRegression {
                c: self.logistic_c,
                solver: self.logistic_solver,
            },
            ModelFamily::LinearSvm => HyperParameters::LinearSvm { c: self.svm_c },
            ModelFamily::RandomForest => HyperParameters::RandomForest {
                n_trees: self.forest.n_trees,
                max_depth: self.forest.max_depth,
                feature_fraction: self.forest.feature_fraction,
                seed: self.forest.seed,
            },
        }
    }
}

/// Hyperparameter search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TuningConfig {
    /// Family to tune
    #[serde(default = "default_tuning_family")]
    pub family: ModelFamily,

    /// Tune whichever family won selection instead of `family`
    #[serde(default)]
    pub tune_selected: bool,

    /// Number of cross-validation folds
    #[serde(default = "default_cv_folds")]
    #[validate(range(min = 2))]
    pub cv_folds: usize,

    /// Logistic regression C grid
    #[serde(default = "default_c_values")]
    #[validate(length(min = 1), custom(function = "validate_positive"))]
    pub c_values: Vec<f64>,

    /// Logistic regression solver grid
    #[serde(default = "default_solvers")]
    #[validate(length(min = 1))]
    pub solvers: Vec<LogisticSolver>,

    /// Linear SVM C grid
    #[serde(default = "default_c_values")]
    #[validate(length(min = 1), custom(function = "validate_positive"))]
    pub svm_c_values: Vec<f64>,

    /// Random forest tree-count grid
    #[serde(default = "default_forest_trees")]
    #[validate(length(min = 1))]
    pub forest_n_trees: Vec<usize>,

    /// Random forest depth grid (0 means unbounded)
    #[serde(default = "default_forest_depths")]
    #[validate(length(min = 1))]
    pub forest_max_depths: Vec<u16>,

    /// Fixed forest settings not searched over
    #[serde(default)]
    #[validate(nested)]
    pub forest: ForestConfig,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            family: default_tuning_family(),
            tune_selected: false,
            cv_folds: default_cv_folds(),
            c_values: default_c_values(),
            solvers: default_solvers(),
            svm_c_values: default_c_values(),
            forest_n_trees: default_forest_trees(),
            forest_max_depths: default_forest_depths(),
            forest: ForestConfig::default(),
        }
    }
}

/// Held-out evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EvaluationConfig {
    /// Untimed predictions before measuring
    #[serde(default = "default_warmup")]
    pub warmup_iterations: usize,

    /// Timed single-row predictions
    #[serde(default = "default_iterations")]
    #[validate(range(min = 1))]
    pub iterations: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: default_warmup(),
            iterations: default_iterations(),
        }
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Support-weighted F1 score
    pub f1_score: f64,

    /// Per-class metrics keyed by category label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_class: BTreeMap<String, ClassMetrics>,
}

impl ModelMetrics {
    pub fn new(accuracy: f64, f1_score: f64) -> Self {
        Self {
            accuracy,
            f1_score,
            per_class: BTreeMap::new(),
        }
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Counts of (actual, predicted) category pairs; rows are actual labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Category labels in index order
    pub labels: Vec<String>,

    /// `counts[actual][predicted]`
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Total number of counted predictions
    pub fn total(&self) -> usize {
        self.counts.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    /// Correct predictions (diagonal)
    pub fn correct(&self) -> usize {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, row)| row.get(i).copied().unwrap_or(0))
            .sum()
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model family
    pub family: ModelFamily,

    /// Hyperparameters the model was fitted with
    pub hyperparameters: HyperParameters,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Number of categories the model predicts over
    pub n_classes: usize,
}

fn validate_positive(values: &[f64]) -> std::result::Result<(), ValidationError> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("non_positive_value"))
    }
}

// Default value functions
fn default_max_features() -> usize {
    5000
}

fn default_min_doc_freq() -> usize {
    1
}

fn default_ngram_range() -> (usize, usize) {
    (1, 2)
}

fn default_true() -> bool {
    true
}

fn default_n_trees() -> usize {
    100
}

fn default_feature_fraction() -> f64 {
    0.3
}

fn default_seed() -> u64 {
    42
}

fn default_families() -> Vec<ModelFamily> {
    vec![
        ModelFamily::LogisticRegression,
        ModelFamily::LinearSvm,
        ModelFamily::RandomForest,
    ]
}

fn default_c() -> f64 {
    1.0
}

fn default_solver() -> LogisticSolver {
    LogisticSolver::Lbfgs
}

fn default_tuning_family() -> ModelFamily {
    ModelFamily::LogisticRegression
}

fn default_cv_folds() -> usize {
    5
}

fn default_c_values() -> Vec<f64> {
    vec![0.01, 0.1, 1.0, 10.0, 100.0]
}

fn default_solvers() -> Vec<LogisticSolver> {
    vec![LogisticSolver::Lbfgs, LogisticSolver::Liblinear]
}

fn default_forest_trees() -> Vec<usize> {
    vec![50, 100]
}

fn default_forest_depths() -> Vec<u16> {
    vec![0, 20]
}

fn default_warmup() -> usize {
    10
}

fn default_iterations() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_feature_config_default() {
        let config = FeatureConfig::default();
        assert_eq!(config.max_features, 5000);
        assert_eq!(config.ngram_range, (1, 2));
        assert!(config.stop_words);
        assert!(config.validate().is_ok());
        assert!(config.check_ngram_range().is_ok());
    }

    #[test]
    fn test_invalid_ngram_range() {
        let config = FeatureConfig {
            ngram_range: (2, 1),
            ..FeatureConfig::default()
        };
        assert!(config.check_ngram_range().is_err());
    }

    #[test]
    fn test_model_family_display_and_key() {
        assert_eq!(ModelFamily::LogisticRegression.to_string(), "Logistic Regression");
        assert_eq!(ModelFamily::LinearSvm.to_string(), "Linear SVM");
        assert_eq!(ModelFamily::RandomForest.key(), "random_forest");
        assert_eq!(
            ModelFamily::from_str("linear_svm").unwrap(),
            ModelFamily::LinearSvm
        );
        assert!(!ModelFamily::LinearSvm.has_probabilities());
    }

    #[test]
    fn test_hyperparameters_serde() {
        let params = HyperParameters::LogisticRegression {
            c: 10.0,
            solver: LogisticSolver::Liblinear,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["logistic_regression"]["solver"], "liblinear");

        let bytes = bincode::serialize(&params).unwrap();
        assert_eq!(bincode::deserialize::<HyperParameters>(&bytes).unwrap(), params);
        assert_eq!(params.family(), ModelFamily::LogisticRegression);
        assert_eq!(params.to_string(), "C=10, solver=liblinear");
    }

    #[test]
    fn test_tuning_config_rejects_bad_grid() {
        let mut config = TuningConfig::default();
        assert!(config.validate().is_ok());

        config.c_values = vec![1.0, -0.5];
        assert!(config.validate().is_err());

        let config = TuningConfig {
            cv_folds: 1,
            ..TuningConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selection_params_for() {
        let config = SelectionConfig::default();
        match config.params_for(ModelFamily::RandomForest) {
            HyperParameters::RandomForest { n_trees, seed, .. } => {
                assert_eq!(n_trees, 100);
                assert_eq!(seed, 42);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_confusion_matrix_totals() {
        let matrix = ConfusionMatrix {
            labels: vec!["A".to_string(), "B".to_string()],
            counts: vec![vec![3, 1], vec![0, 4]],
        };
        assert_eq!(matrix.total(), 8);
        assert_eq!(matrix.correct(), 7);
    }
}
