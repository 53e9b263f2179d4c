use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, TrainedModel};
use crate::ml::metrics;
use crate::ml::models::{HyperParameters, ModelFamily, ModelMetrics, TuningConfig};
use crate::ml::selection::fit_guarded;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Deterministic stratified k-fold splitter.
///
/// Each class's rows, in original order, are cut into `n_splits` contiguous
/// chunks (the first `len % n_splits` chunks one row longer); fold `i` is the
/// union of every class's chunk `i`. The largest class must have at least
/// `n_splits` rows so that every fold has test rows.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// `(train_indices, test_indices)` per fold, both sorted ascending
    pub fn split(&self, labels: &[usize]) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 {
            return Err(AppError::Configuration(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.n_splits
            )));
        }
        if labels.len() < self.n_splits {
            return Err(AppError::Training(format!(
                "cannot split {} samples into {} folds",
                labels.len(),
                self.n_splits
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }

        let largest = by_class.values().map(Vec::len).max().unwrap_or(0);
        if largest < self.n_splits {
            return Err(AppError::Training(format!(
                "n_splits={} is greater than the number of members in every class (largest has {})",
                self.n_splits, largest
            )));
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for indices in by_class.values() {
            let fold_size = indices.len() / self.n_splits;
            let remainder = indices.len() % self.n_splits;

            let mut start = 0;
            for (i, fold) in folds.iter_mut().enumerate() {
                let size = if i < remainder { fold_size + 1 } else { fold_size };
                fold.extend_from_slice(&indices[start..start + size]);
                start += size;
            }
        }

        Ok(folds
            .into_iter()
            .map(|mut test| {
                test.sort_unstable();
                let train = (0..labels.len())
                    .filter(|i| test.binary_search(i).is_err())
                    .collect();
                (train, test)
            })
            .collect())
    }
}

/// Cross-validation outcome of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPointReport {
    pub params: HyperParameters,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// Set when any fold failed; the point is then excluded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted summary of a search (`tuning.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    pub family: ModelFamily,
    pub cv_folds: usize,
    pub best_params: HyperParameters,
    pub best_cv_score: f64,
    pub grid: Vec<GridPointReport>,
    /// Held-out metrics of the full-data refit
    pub test_metrics: ModelMetrics,
}

/// Refit model plus the search record
#[derive(Debug)]
pub struct Tuned {
    pub model: TrainedModel,
    pub report: TuningReport,
}

/// Exhaustive cross-validated grid search for one family
pub struct HyperparameterOptimizer {
    config: TuningConfig,
}

impl HyperparameterOptimizer {
    pub fn new(config: TuningConfig) -> Self {
        Self { config }
    }

    /// Grid points in evaluation order
    pub fn grid(&self, family: ModelFamily) -> Vec<HyperParameters> {
        match family {
            ModelFamily::LogisticRegression => self
                .config
                .c_values
                .iter()
                .flat_map(|&c| {
                    self.config
                        .solvers
                        .iter()
                        .map(move |&solver| HyperParameters::LogisticRegression { c, solver })
                })
                .collect(),
            ModelFamily::LinearSvm => self
                .config
                .svm_c_values
                .iter()
                .map(|&c| HyperParameters::LinearSvm { c })
                .collect(),
            ModelFamily::RandomForest => self
                .config
                .forest_n_trees
                .iter()
                .flat_map(|&n_trees| {
                    self.config.forest_max_depths.iter().map(move |&depth| {
                        HyperParameters::RandomForest {
                            n_trees,
                            max_depth: (depth > 0).then_some(depth),
                            feature_fraction: self.config.forest.feature_fraction,
                            seed: self.config.forest.seed,
                        }
                    })
                })
                .collect(),
        }
    }

    /// Search the grid with k-fold CV on the training set, refit the winner
    /// on the whole training set and score it on the held-out test set.
    pub fn optimize(
        &self,
        family: ModelFamily,
        train_x: &Array2<f64>,
        train_y: &[usize],
        test_x: &Array2<f64>,
        test_y: &[usize],
        n_classes: usize,
    ) -> Result<Tuned> {
        let grid = self.grid(family);
        if grid.is_empty() {
            return Err(AppError::Configuration(format!(
                "empty hyperparameter grid for {}",
                family
            )));
        }

        let folds = StratifiedKFold::new(self.config.cv_folds).split(train_y)?;
        info!(
            family = %family,
            grid_points = grid.len(),
            folds = folds.len(),
            "Starting grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..grid.len())
            .flat_map(|p| (0..folds.len()).map(move |f| (p, f)))
            .collect();

        let scores: Vec<Result<f64>> = tasks
            .par_iter()
            .map(|&(p, f)| {
                let (train_idx, test_idx) = &folds[f];
                score_fold(train_x, train_y, train_idx, test_idx, n_classes, &grid[p])
            })
            .collect();

        let mut reports: Vec<GridPointReport> = grid
            .iter()
            .map(|params| GridPointReport {
                params: params.clone(),
                fold_scores: Vec::with_capacity(folds.len()),
                mean_score: 0.0,
                std_score: 0.0,
                error: None,
            })
            .collect();

        for (&(p, _), score) in tasks.iter().zip(scores) {
            match score {
                Ok(s) => reports[p].fold_scores.push(s),
                Err(e) => {
                    if reports[p].error.is_none() {
                        reports[p].error = Some(e.to_string());
                    }
                }
            }
        }

        for report in reports.iter_mut() {
            if let Some(err) = &report.error {
                warn!(params = %report.params, error = %err, "Grid point failed, excluded");
                continue;
            }
            let (mean, std) = mean_std(&report.fold_scores);
            report.mean_score = mean;
            report.std_score = std;
            debug!(params = %report.params, mean, std, "Grid point scored");
        }

        let best = select_best(&reports).ok_or_else(|| {
            AppError::NoModelTrained(format!("every grid point for {} failed", family))
        })?;

        let best_params = reports[best].params.clone();
        let best_cv_score = reports[best].mean_score;
        info!(params = %best_params, cv_f1 = best_cv_score, "Best hyperparameters found");

        let model = fit_guarded(train_x, train_y, n_classes, &best_params)?;
        let predictions = model.predict(test_x)?;
        let test_metrics = ModelMetrics::new(
            metrics::accuracy(test_y, &predictions),
            metrics::weighted_f1(test_y, &predictions, n_classes),
        );
        info!(
            accuracy = test_metrics.accuracy,
            f1 = test_metrics.f1_score,
            "Tuned model evaluated on test set"
        );

        Ok(Tuned {
            model,
            report: TuningReport {
                family,
                cv_folds: folds.len(),
                best_params,
                best_cv_score,
                grid: reports,
                test_metrics,
            },
        })
    }
}

/// Highest mean among successful points; ties keep the earliest
fn select_best(reports: &[GridPointReport]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, report) in reports.iter().enumerate() {
        if report.error.is_some() {
            continue;
        }
        match best {
            Some(b) if report.mean_score <= reports[b].mean_score => {}
            _ => best = Some(idx),
        }
    }
    best
}

fn score_fold(
    x: &Array2<f64>,
    y: &[usize],
    train_idx: &[usize],
    test_idx: &[usize],
    n_classes: usize,
    params: &HyperParameters,
) -> Result<f64> {
    if test_idx.is_empty() || train_idx.is_empty() {
        return Err(AppError::Training(format!(
            "degenerate fold: {} training rows, {} test rows",
            train_idx.len(),
            test_idx.len()
        )));
    }

    let fold_train_x = x.select(Axis(0), train_idx);
    let fold_train_y: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
    let fold_test_x = x.select(Axis(0), test_idx);
    let fold_test_y: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

    let model = fit_guarded(&fold_train_x, &fold_train_y, n_classes, params)?;
    model.score(&fold_test_x, &fold_test_y)
}

/// Mean and population standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::LogisticSolver;

    fn dataset() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            let mut row = vec![0.02 * (i % 5) as f64; 6];
            row[class * 2] += 1.0;
            row[class * 2 + 1] += 0.7;
            rows.extend(row);
            labels.push(class);
        }
        (Array2::from_shape_vec((30, 6), rows).unwrap(), labels)
    }

    #[test]
    fn test_stratified_kfold_partitions() {
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2];
        let folds = StratifiedKFold::new(2).split(&labels).unwrap();

        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].1, vec![0, 1, 4, 5, 8]);
        assert_eq!(folds[1].1, vec![2, 3, 6, 7, 9]);

        let mut all_test: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..10).collect::<Vec<_>>());

        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 10);
            assert!(train.iter().all(|i| !test.contains(i)));
        }
    }

    #[test]
    fn test_stratified_kfold_rejects_tiny_inputs() {
        assert!(StratifiedKFold::new(1).split(&[0, 1]).is_err());
        assert!(StratifiedKFold::new(5).split(&[0, 1, 0]).is_err());
    }

    #[test]
    fn test_stratified_kfold_rejects_classes_smaller_than_folds() {
        let err = StratifiedKFold::new(5).split(&[0, 0, 1, 1, 2, 2]).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_stratified_kfold_every_fold_has_test_rows() {
        // Only class 0 reaches five rows; the small classes fill the first folds
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 2];
        let folds = StratifiedKFold::new(5).split(&labels).unwrap();

        assert_eq!(folds.len(), 5);
        for (train, test) in &folds {
            assert!(!test.is_empty());
            assert!(!train.is_empty());
        }
    }

    #[test]
    fn test_optimize_refuses_too_few_rows_per_class() {
        let (x, y) = dataset();
        let rows: Vec<usize> = (0..9).collect();
        let small_x = x.select(Axis(0), &rows);
        let small_y = y[..9].to_vec();
        let config = TuningConfig {
            cv_folds: 5,
            ..TuningConfig::default()
        };

        let err = HyperparameterOptimizer::new(config)
            .optimize(ModelFamily::LinearSvm, &small_x, &small_y, &small_x, &small_y, 3)
            .unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_empty_test_fold_is_an_error() {
        let (x, y) = dataset();
        let train: Vec<usize> = (0..30).collect();
        let params = HyperParameters::LinearSvm { c: 1.0 };

        let err = score_fold(&x, &y, &train, &[], 3, &params).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_grid_order_is_c_then_solver() {
        let optimizer = HyperparameterOptimizer::new(TuningConfig::default());
        let grid = optimizer.grid(ModelFamily::LogisticRegression);

        assert_eq!(grid.len(), 10);
        assert_eq!(
            grid[0],
            HyperParameters::LogisticRegression {
                c: 0.01,
                solver: LogisticSolver::Lbfgs
            }
        );
        assert_eq!(
            grid[1],
            HyperParameters::LogisticRegression {
                c: 0.01,
                solver: LogisticSolver::Liblinear
            }
        );
        assert_eq!(optimizer.grid(ModelFamily::LinearSvm).len(), 5);
        assert_eq!(optimizer.grid(ModelFamily::RandomForest).len(), 4);
    }

    #[test]
    fn test_select_best_ties_keep_first() {
        let point = |mean: f64, error: Option<&str>| GridPointReport {
            params: HyperParameters::LinearSvm { c: mean },
            fold_scores: vec![mean],
            mean_score: mean,
            std_score: 0.0,
            error: error.map(str::to_string),
        };
        let reports = vec![
            point(0.5, None),
            point(0.9, None),
            point(0.9, None),
            point(0.99, Some("diverged")),
        ];
        assert_eq!(select_best(&reports), Some(1));
        assert_eq!(select_best(&[point(0.1, Some("x"))]), None);
    }

    #[test]
    fn test_optimize_picks_max_cv_score() {
        let (x, y) = dataset();
        let config = TuningConfig {
            cv_folds: 3,
            c_values: vec![0.1, 10.0],
            ..TuningConfig::default()
        };
        let tuned = HyperparameterOptimizer::new(config)
            .optimize(ModelFamily::LogisticRegression, &x, &y, &x, &y, 3)
            .unwrap();

        let report = &tuned.report;
        assert_eq!(report.grid.len(), 4);
        for point in &report.grid {
            assert_eq!(point.fold_scores.len(), 3);
            assert!(report.best_cv_score >= point.mean_score);
        }
        assert_eq!(tuned.model.metadata.hyperparameters, report.best_params);
        // Refit uses every training row
        assert_eq!(tuned.model.metadata.n_training_samples, 30);
    }

    #[test]
    fn test_optimize_all_points_failing() {
        let (x, y) = dataset();
        let config = TuningConfig {
            cv_folds: 3,
            svm_c_values: vec![-1.0],
            ..TuningConfig::default()
        };
        let err = HyperparameterOptimizer::new(config)
            .optimize(ModelFamily::LinearSvm, &x, &y, &x, &y, 3)
            .unwrap_err();
        assert!(matches!(err, AppError::NoModelTrained(_)));
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }
}
