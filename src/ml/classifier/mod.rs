//! Classifier families behind one capability set.
//!
//! Every family fits on a dense feature matrix with integer labels in
//! `0..n_classes`, predicts class indices, and may expose a
//! `(n_samples, n_classes)` probability matrix. Selection and tuning only
//! ever see the [`TrainedClassifier`] variant set.

mod forest;
mod logistic;
mod svm;

pub use forest::RandomForestModel;
pub use logistic::LogisticModel;
pub use svm::LinearSvmModel;

use crate::error::{AppError, Result};
use crate::ml::metrics;
use crate::ml::models::{HyperParameters, ModelFamily, ModelMetadata};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Predict class indices
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict class probabilities, `None` when the family has no calibrated scores
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>>;

    /// Number of categories predicted over
    fn n_classes(&self) -> usize;

    /// Feature width the model was fitted on
    fn n_features(&self) -> usize;

    /// Weighted F1 on a labelled set
    fn score(&self, features: &Array2<f64>, labels: &[usize]) -> Result<f64> {
        let predictions = self.predict(features)?;
        Ok(metrics::weighted_f1(labels, &predictions, self.n_classes()))
    }
}

/// A fitted classifier of one of the supported families
#[derive(Debug, Serialize, Deserialize)]
pub enum TrainedClassifier {
    Logistic(LogisticModel),
    LinearSvm(LinearSvmModel),
    RandomForest(RandomForestModel),
}

impl TrainedClassifier {
    /// Fit the family named by `params`
    pub fn fit(
        features: &Array2<f64>,
        labels: &[usize],
        n_classes: usize,
        params: &HyperParameters,
    ) -> Result<Self> {
        check_training_set(features, labels, n_classes)?;

        let model = match params {
            HyperParameters::LogisticRegression { c, solver } => TrainedClassifier::Logistic(
                LogisticModel::fit(features, labels, n_classes, *c, *solver)?,
            ),
            HyperParameters::LinearSvm { c } => {
                TrainedClassifier::LinearSvm(LinearSvmModel::fit(features, labels, n_classes, *c)?)
            }
            HyperParameters::RandomForest {
                n_trees,
                max_depth,
                feature_fraction,
                seed,
            } => TrainedClassifier::RandomForest(RandomForestModel::fit(
                features,
                labels,
                n_classes,
                *n_trees,
                *max_depth,
                *feature_fraction,
                *seed,
            )?),
        };

        Ok(model)
    }

    /// Family of the fitted model
    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedClassifier::Logistic(_) => ModelFamily::LogisticRegression,
            TrainedClassifier::LinearSvm(_) => ModelFamily::LinearSvm,
            TrainedClassifier::RandomForest(_) => ModelFamily::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedClassifier::Logistic(m) => m,
            TrainedClassifier::LinearSvm(m) => m,
            TrainedClassifier::RandomForest(m) => m,
        }
    }
}

impl Classifier for TrainedClassifier {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        check_width(features, self.n_features())?;
        self.inner().predict(features)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        check_width(features, self.n_features())?;
        self.inner().predict_proba(features)
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }
}

/// Fitted classifier plus the facts needed to audit it
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    pub metadata: ModelMetadata,
    pub classifier: TrainedClassifier,
}

impl TrainedModel {
    /// Fit and stamp metadata
    pub fn fit(
        features: &Array2<f64>,
        labels: &[usize],
        n_classes: usize,
        params: &HyperParameters,
    ) -> Result<Self> {
        let classifier = TrainedClassifier::fit(features, labels, n_classes, params)?;

        Ok(Self {
            metadata: ModelMetadata {
                family: params.family(),
                hyperparameters: params.clone(),
                trained_at: chrono::Utc::now(),
                n_training_samples: features.nrows(),
                n_features: features.ncols(),
                n_classes,
            },
            classifier,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.metadata.family
    }
}

impl Classifier for TrainedModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        self.classifier.predict(features)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        self.classifier.predict_proba(features)
    }

    fn n_classes(&self) -> usize {
        self.classifier.n_classes()
    }

    fn n_features(&self) -> usize {
        self.classifier.n_features()
    }
}

fn check_training_set(features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()> {
    if features.nrows() == 0 {
        return Err(AppError::Training("empty training set".to_string()));
    }
    if features.nrows() != labels.len() {
        return Err(AppError::Training(format!(
            "{} feature rows but {} labels",
            features.nrows(),
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(AppError::IndexOutOfRange {
            index: bad,
            len: n_classes,
        });
    }
    Ok(())
}

fn check_width(features: &Array2<f64>, expected: usize) -> Result<()> {
    if features.ncols() != expected {
        return Err(AppError::Internal(format!(
            "feature width {} does not match model width {}",
            features.ncols(),
            expected
        )));
    }
    Ok(())
}

/// Sorted distinct labels present in a training set
pub(crate) fn present_classes(labels: &[usize]) -> Vec<usize> {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Row-wise argmax; ties resolve to the lowest index
pub(crate) fn argmax_rows(scores: &Array2<f64>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (idx, &value) in row.iter().enumerate() {
                if value > row[best] {
                    best = idx;
                }
            }
            best
        })
        .collect()
}

pub(crate) fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let (rows, cols) = arr.dim();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(rows, cols, data, false)
}

pub(crate) fn labels_to_i32(labels: &[usize]) -> Vec<i32> {
    labels.iter().map(|&x| x as i32).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::separable_dataset;
    use super::*;
    use crate::ml::models::LogisticSolver;

    #[test]
    fn test_argmax_ties_pick_lowest() {
        let scores = Array2::from_shape_vec((2, 3), vec![0.2, 0.5, 0.5, 1.0, 1.0, 0.0]).unwrap();
        assert_eq!(argmax_rows(&scores), vec![1, 0]);
    }

    #[test]
    fn test_fit_rejects_mismatched_labels() {
        let (x, _) = separable_dataset();
        let params = HyperParameters::LinearSvm { c: 1.0 };
        let result = TrainedClassifier::fit(&x, &[0, 1], 3, &params);
        assert!(matches!(result, Err(AppError::Training(_))));
    }

    #[test]
    fn test_fit_rejects_label_outside_codec() {
        let (x, mut y) = separable_dataset();
        y[0] = 7;
        let params = HyperParameters::LinearSvm { c: 1.0 };
        let result = TrainedClassifier::fit(&x, &y, 3, &params);
        assert!(matches!(result, Err(AppError::IndexOutOfRange { index: 7, .. })));
    }

    #[test]
    fn test_every_family_separates_clean_data() {
        let (x, y) = separable_dataset();
        let candidates = [
            HyperParameters::LogisticRegression {
                c: 10.0,
                solver: LogisticSolver::Lbfgs,
            },
            HyperParameters::LinearSvm { c: 1.0 },
            HyperParameters::RandomForest {
                n_trees: 10,
                max_depth: None,
                feature_fraction: 1.0,
                seed: 42,
            },
        ];

        for params in &candidates {
            let model = TrainedModel::fit(&x, &y, 3, params).unwrap();
            assert_eq!(model.family(), params.family());
            assert_eq!(model.n_classes(), 3);
            assert_eq!(model.n_features(), 6);
            let f1 = model.score(&x, &y).unwrap();
            assert!(f1 > 0.9, "{} scored {}", params.family(), f1);
        }
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = separable_dataset();
        let params = HyperParameters::LinearSvm { c: 1.0 };
        let model = TrainedClassifier::fit(&x, &y, 3, &params).unwrap();

        let narrow = Array2::<f64>::zeros((1, 4));
        assert!(model.predict(&narrow).is_err());
    }

    #[test]
    fn test_probability_availability_follows_family() {
        let (x, y) = separable_dataset();
        let svm = TrainedClassifier::fit(&x, &y, 3, &HyperParameters::LinearSvm { c: 1.0 }).unwrap();
        assert!(svm.predict_proba(&x).unwrap().is_none());

        let lr = TrainedClassifier::fit(
            &x,
            &y,
            3,
            &HyperParameters::LogisticRegression {
                c: 1.0,
                solver: LogisticSolver::Liblinear,
            },
        )
        .unwrap();
        let proba = lr.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.dim(), (30, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}
