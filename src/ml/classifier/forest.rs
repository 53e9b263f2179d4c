use super::{argmax_rows, labels_to_i32, ndarray_to_densematrix, Classifier};
use crate::error::{AppError, Result};
use ndarray::{Array2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// One member of the ensemble
#[derive(Debug, Serialize, Deserialize)]
enum BaggedTree {
    /// Bootstrap sample held a single class
    Constant(usize),
    /// Gini tree over a subset of columns
    Fitted { features: Vec<usize>, tree: Tree },
}

/// Bagged Gini decision trees voting by majority.
///
/// Tree `t` draws its bootstrap rows and its column subspace from
/// `StdRng::seed_from_u64(seed + t)`, so a fit is reproducible for a fixed seed.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForestModel {
    trees: Vec<BaggedTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForestModel {
    pub fn fit(
        features: &Array2<f64>,
        labels: &[usize],
        n_classes: usize,
        n_trees: usize,
        max_depth: Option<u16>,
        feature_fraction: f64,
        seed: u64,
    ) -> Result<Self> {
        if n_trees == 0 {
            return Err(AppError::Training("n_trees must be at least 1".to_string()));
        }
        if !(feature_fraction > 0.0 && feature_fraction <= 1.0) {
            return Err(AppError::Training(format!(
                "feature_fraction must be in (0, 1], got {}",
                feature_fraction
            )));
        }

        let n_features = features.ncols();
        let subspace = ((n_features as f64 * feature_fraction).ceil() as usize).min(n_features);

        let trees = (0..n_trees)
            .into_par_iter()
            .map(|t| {
                fit_tree(
                    features,
                    labels,
                    subspace,
                    max_depth,
                    seed.wrapping_add(t as u64),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(n_trees, subspace, "Random forest fitted");

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }

    /// Vote counts per class, `(n_samples, n_classes)`
    fn votes(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let n = features.nrows();
        let mut votes = Array2::zeros((n, self.n_classes));

        for tree in &self.trees {
            let predictions: Vec<usize> = match tree {
                BaggedTree::Constant(class) => vec![*class; n],
                BaggedTree::Fitted { features: cols, tree } => {
                    let x = ndarray_to_densematrix(&features.select(Axis(1), cols));
                    tree.predict(&x)
                        .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?
                        .into_iter()
                        .map(|p| p as usize)
                        .collect()
                }
            };

            for (i, class) in predictions.into_iter().enumerate() {
                if class < self.n_classes {
                    votes[[i, class]] += 1.0;
                }
            }
        }

        Ok(votes)
    }
}

impl Classifier for RandomForestModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.votes(features)?))
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let votes = self.votes(features)?;
        Ok(Some(votes / self.trees.len() as f64))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn fit_tree(
    features: &Array2<f64>,
    labels: &[usize],
    subspace: usize,
    max_depth: Option<u16>,
    seed: u64,
) -> Result<BaggedTree> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_samples = features.nrows();

    let dist = Uniform::from(0..n_samples);
    let rows: Vec<usize> = (0..n_samples).map(|_| dist.sample(&mut rng)).collect();
    let boot_labels: Vec<usize> = rows.iter().map(|&i| labels[i]).collect();

    let first = boot_labels[0];
    if subspace == 0 || boot_labels.iter().all(|&l| l == first) {
        return Ok(BaggedTree::Constant(majority(&boot_labels)));
    }

    let mut cols = rand::seq::index::sample(&mut rng, features.ncols(), subspace).into_vec();
    cols.sort_unstable();

    let x = ndarray_to_densematrix(&features.select(Axis(0), &rows).select(Axis(1), &cols));
    let y = labels_to_i32(&boot_labels);

    let mut params = DecisionTreeClassifierParameters::default().with_criterion(SplitCriterion::Gini);
    if let Some(depth) = max_depth.filter(|d| *d > 0) {
        params = params.with_max_depth(depth);
    }

    let tree = DecisionTreeClassifier::fit(&x, &y, params)
        .map_err(|e| AppError::Training(format!("Failed to train decision tree: {}", e)))?;

    Ok(BaggedTree::Fitted {
        features: cols,
        tree,
    })
}

fn majority(labels: &[usize]) -> usize {
    let max = labels.iter().copied().max().unwrap_or(0);
    let mut counts = vec![0usize; max + 1];
    for &l in labels {
        counts[l] += 1;
    }
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
