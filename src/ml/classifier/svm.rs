use super::{argmax_rows, present_classes, Classifier};
use crate::error::{AppError, Result};
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One-vs-rest linear SVM.
///
/// Each class keeps only its primal weight vector `w = Σ αᵢ·xᵢ` and offset
/// `ρ`; the decision value is `w·x − ρ`. No probability estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvmModel {
    /// Global class index for each weight row
    classes: Vec<usize>,
    weights: Array2<f64>,
    rho: Array1<f64>,
    n_classes: usize,
    n_features: usize,
}

impl LinearSvmModel {
    /// Fit one binary SVM per class present in `labels`
    pub fn fit(features: &Array2<f64>, labels: &[usize], n_classes: usize, c: f64) -> Result<Self> {
        if !(c.is_finite() && c > 0.0) {
            return Err(AppError::Training(format!("C must be positive, got {}", c)));
        }

        let n_features = features.ncols();
        let classes = present_classes(labels);

        if classes.len() == 1 {
            return Ok(Self {
                classes,
                weights: Array2::zeros((1, n_features)),
                rho: Array1::zeros(1),
                n_classes,
                n_features,
            });
        }

        let fitted: Vec<(Array1<f64>, f64)> = classes
            .par_iter()
            .map(|&class| fit_binary(features, labels, class, c))
            .collect::<Result<_>>()?;

        let mut weights = Array2::zeros((classes.len(), n_features));
        let mut rho = Array1::zeros(classes.len());
        for (row, (w, r)) in fitted.into_iter().enumerate() {
            weights.row_mut(row).assign(&w);
            rho[row] = r;
        }

        Ok(Self {
            classes,
            weights,
            rho,
            n_classes,
            n_features,
        })
    }

    /// Decision values, one column per class seen in training
    pub fn decision_function(&self, features: &Array2<f64>) -> Array2<f64> {
        let mut scores = features.dot(&self.weights.t());
        scores -= &self.rho;
        scores
    }
}

impl Classifier for LinearSvmModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let scores = self.decision_function(features);
        Ok(argmax_rows(&scores)
            .into_iter()
            .map(|i| self.classes[i])
            .collect())
    }

    fn predict_proba(&self, _features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn fit_binary(
    features: &Array2<f64>,
    labels: &[usize],
    class: usize,
    c: f64,
) -> Result<(Array1<f64>, f64)> {
    let targets = Array1::from_vec(labels.iter().map(|&l| l == class).collect::<Vec<bool>>());
    let dataset = Dataset::new(features.clone(), targets);

    let svm = Svm::<_, bool>::params()
        .pos_neg_weights(c, c)
        .linear_kernel()
        .fit(&dataset)
        .map_err(|e| AppError::Training(format!("SVM training failed for class {}: {}", class, e)))?;

    let mut weights = Array1::zeros(features.ncols());
    for (i, &alpha_i) in svm.alpha.iter().enumerate() {
        weights.scaled_add(alpha_i, &features.row(i));
    }

    Ok((weights, svm.rho))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::separable_dataset;
    use super::*;

    #[test]
    fn test_linear_svm_one_vs_rest() {
        let (x, y) = separable_dataset();
        let model = LinearSvmModel::fit(&x, &y, 3, 1.0).unwrap();

        assert_eq!(model.weights.nrows(), 3);
        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.predict_proba(&x).unwrap().is_none());
    }

    #[test]
    fn test_decision_function_shape() {
        let (x, y) = separable_dataset();
        let model = LinearSvmModel::fit(&x, &y, 3, 1.0).unwrap();
        assert_eq!(model.decision_function(&x).dim(), (30, 3));
    }

    #[test]
    fn test_single_class_predicts_it() {
        let x = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let model = LinearSvmModel::fit(&x, &[1, 1], 3, 1.0).unwrap();
        assert_eq!(model.predict(&x).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let (x, y) = separable_dataset();
        assert!(LinearSvmModel::fit(&x, &y, 3, -1.0).is_err());
    }
}
