use super::{argmax_rows, labels_to_i32, ndarray_to_densematrix, present_classes, Classifier};
use crate::error::{AppError, Result};
use crate::ml::models::LogisticSolver;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array as _;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{
    LogisticRegression, LogisticRegressionParameters, LogisticRegressionSolverName,
};

/// How raw linear scores become class probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Link {
    /// Only one class seen in training
    Constant,
    /// Two classes, one weight row scoring the second
    Sigmoid,
    /// One weight row per class, jointly normalized
    Softmax,
    /// Independent binary models, sigmoid scores normalized to sum to one
    OneVsRest,
}

/// Logistic regression over the shared feature space.
///
/// Weights are extracted from the fitted smartcore models so the artifact
/// holds plain arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    link: Link,
    /// Global class index for each weight row (or each side of the sigmoid)
    classes: Vec<usize>,
    weights: Array2<f64>,
    intercepts: Array1<f64>,
    n_classes: usize,
    n_features: usize,
}

impl LogisticModel {
    /// Fit with inverse regularization strength `c`
    pub fn fit(
        features: &Array2<f64>,
        labels: &[usize],
        n_classes: usize,
        c: f64,
        solver: LogisticSolver,
    ) -> Result<Self> {
        if !(c.is_finite() && c > 0.0) {
            return Err(AppError::Training(format!("C must be positive, got {}", c)));
        }

        let alpha = 1.0 / c;
        let n_features = features.ncols();
        let classes = present_classes(labels);
        let x = ndarray_to_densematrix(features);

        let (link, weights, intercepts) = match (classes.len(), solver) {
            (1, _) => (
                Link::Constant,
                Array2::zeros((0, n_features)),
                Array1::zeros(0),
            ),
            (2, _) => {
                let (w, b) = fit_smartcore(&x, labels_to_i32(labels), alpha)?;
                (Link::Sigmoid, w, b)
            }
            (_, LogisticSolver::Lbfgs) => {
                let (w, b) = fit_smartcore(&x, labels_to_i32(labels), alpha)?;
                (Link::Softmax, w, b)
            }
            (_, LogisticSolver::Liblinear) => {
                let mut weights = Array2::zeros((classes.len(), n_features));
                let mut intercepts = Array1::zeros(classes.len());
                for (row, &class) in classes.iter().enumerate() {
                    let binary: Vec<i32> = labels.iter().map(|&l| i32::from(l == class)).collect();
                    let (w, b) = fit_smartcore(&x, binary, alpha)?;
                    weights.row_mut(row).assign(&w.row(0));
                    intercepts[row] = b[0];
                }
                (Link::OneVsRest, weights, intercepts)
            }
        };

        let expected_rows = match link {
            Link::Constant => 0,
            Link::Sigmoid => 1,
            Link::Softmax | Link::OneVsRest => classes.len(),
        };
        if weights.nrows() != expected_rows || weights.ncols() != n_features {
            return Err(AppError::Training(format!(
                "unexpected coefficient shape {:?} for {} classes",
                weights.dim(),
                classes.len()
            )));
        }

        Ok(Self {
            link,
            classes,
            weights,
            intercepts,
            n_classes,
            n_features,
        })
    }

    /// Probabilities over the classes seen in training, one column each
    fn local_proba(&self, features: &Array2<f64>) -> Array2<f64> {
        let n = features.nrows();
        if self.link == Link::Constant {
            return Array2::ones((n, 1));
        }

        let mut scores = features.dot(&self.weights.t());
        scores += &self.intercepts;

        match self.link {
            Link::Sigmoid => {
                let mut out = Array2::zeros((n, 2));
                for (i, &s) in scores.column(0).iter().enumerate() {
                    let p = sigmoid(s);
                    out[[i, 0]] = 1.0 - p;
                    out[[i, 1]] = p;
                }
                out
            }
            Link::Softmax => {
                for mut row in scores.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                    row.mapv_inplace(|s| (s - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|s| s / sum);
                }
                scores
            }
            Link::OneVsRest => {
                scores.mapv_inplace(sigmoid);
                let k = scores.ncols() as f64;
                for mut row in scores.axis_iter_mut(Axis(0)) {
                    let sum = row.sum();
                    if sum > 0.0 {
                        row.mapv_inplace(|s| s / sum);
                    } else {
                        row.fill(1.0 / k);
                    }
                }
                scores
            }
            Link::Constant => Array2::ones((n, 1)),
        }
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let local = self.local_proba(features);
        Ok(argmax_rows(&local)
            .into_iter()
            .map(|i| self.classes[i])
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let local = self.local_proba(features);
        let mut proba = Array2::zeros((features.nrows(), self.n_classes));
        for (col, &class) in self.classes.iter().enumerate() {
            proba.column_mut(class).assign(&local.column(col));
        }
        Ok(Some(proba))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Fit one smartcore model and copy out `(coefficients, intercepts)`
fn fit_smartcore(x: &DenseMatrix<f64>, y: Vec<i32>, alpha: f64) -> Result<(Array2<f64>, Array1<f64>)> {
    let params = LogisticRegressionParameters::default()
        .with_solver(LogisticRegressionSolverName::LBFGS)
        .with_alpha(alpha);

    let model = LogisticRegression::fit(x, &y, params).map_err(|e| {
        AppError::Training(format!("Failed to train logistic regression: {}", e))
    })?;

    let coefficients = model.coefficients();
    let intercept = model.intercept();
    let (rows, cols) = coefficients.shape();

    let weights = Array2::from_shape_fn((rows, cols), |(i, j)| *coefficients.get((i, j)));
    let bias = Array1::from_shape_fn(rows, |i| *intercept.get((i, 0)));

    Ok((weights, bias))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
