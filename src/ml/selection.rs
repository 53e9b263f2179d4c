use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, TrainedModel};
use crate::ml::metrics;
use crate::ml::models::{HyperParameters, ModelFamily, ModelMetrics, SelectionConfig};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{info, warn};

/// Result of one candidate fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Trained {
        accuracy: f64,
        f1_score: f64,
        training_secs: f64,
    },
    Failed {
        error: String,
    },
}

/// Audit record for one candidate family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub family: ModelFamily,
    pub hyperparameters: HyperParameters,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

impl CandidateReport {
    /// Held-out metrics when the fit succeeded
    pub fn metrics(&self) -> Option<ModelMetrics> {
        match self.outcome {
            CandidateOutcome::Trained {
                accuracy, f1_score, ..
            } => Some(ModelMetrics::new(accuracy, f1_score)),
            CandidateOutcome::Failed { .. } => None,
        }
    }
}

/// Persisted summary of a selection run (`results.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub best_family: ModelFamily,
    pub best_f1_score: f64,
    pub candidates: Vec<CandidateReport>,
}

/// Winning model plus the audit trail
#[derive(Debug)]
pub struct Selection {
    pub model: TrainedModel,
    pub report: SelectionReport,
}

/// Fits every configured family and keeps the best by weighted F1
pub struct ModelSelector {
    config: SelectionConfig,
}

impl ModelSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Train all candidates in parallel on the training set and score them on
    /// the evaluation set.
    ///
    /// Ties keep the earlier candidate in configuration order. Failed
    /// candidates are reported but never selected.
    pub fn select(
        &self,
        train_x: &Array2<f64>,
        train_y: &[usize],
        eval_x: &Array2<f64>,
        eval_y: &[usize],
        n_classes: usize,
    ) -> Result<Selection> {
        let candidates: Vec<HyperParameters> = self
            .config
            .families
            .iter()
            .map(|&family| self.config.params_for(family))
            .collect();

        info!(candidates = candidates.len(), "Training candidate models");

        let fitted: Vec<(HyperParameters, Result<(TrainedModel, ModelMetrics, f64)>)> = candidates
            .into_par_iter()
            .map(|params| {
                let started = Instant::now();
                let result = fit_guarded(train_x, train_y, n_classes, &params).and_then(|model| {
                    let predictions = model.predict(eval_x)?;
                    let scored = ModelMetrics::new(
                        metrics::accuracy(eval_y, &predictions),
                        metrics::weighted_f1(eval_y, &predictions, n_classes),
                    );
                    Ok((model, scored, started.elapsed().as_secs_f64()))
                });
                (params, result)
            })
            .collect();

        let mut best: Option<TrainedModel> = None;
        let mut best_f1 = f64::NEG_INFINITY;
        let mut reports = Vec::with_capacity(fitted.len());

        for (params, result) in fitted {
            let family = params.family();
            match result {
                Ok((model, scored, secs)) => {
                    info!(
                        family = %family,
                        accuracy = scored.accuracy,
                        f1 = scored.f1_score,
                        secs,
                        "Candidate trained"
                    );
                    reports.push(CandidateReport {
                        family,
                        hyperparameters: params,
                        outcome: CandidateOutcome::Trained {
                            accuracy: scored.accuracy,
                            f1_score: scored.f1_score,
                            training_secs: secs,
                        },
                    });
                    if scored.f1_score > best_f1 {
                        best_f1 = scored.f1_score;
                        best = Some(model);
                    }
                }
                Err(e) => {
                    warn!(family = %family, error = %e, "Candidate failed, excluded from selection");
                    reports.push(CandidateReport {
                        family,
                        hyperparameters: params,
                        outcome: CandidateOutcome::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        let model = best.ok_or_else(|| {
            AppError::NoModelTrained(format!(
                "all {} candidate families failed to fit",
                reports.len()
            ))
        })?;

        info!(family = %model.family(), f1 = best_f1, "🏆 Best model selected");

        Ok(Selection {
            report: SelectionReport {
                best_family: model.family(),
                best_f1_score: best_f1,
                candidates: reports,
            },
            model,
        })
    }
}

/// Fit one candidate, turning a panic inside a numerical backend into a
/// `Training` error so sibling fits carry on.
pub(crate) fn fit_guarded(
    features: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    params: &HyperParameters,
) -> Result<TrainedModel> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        TrainedModel::fit(features, labels, n_classes, params)
    }))
    .unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(AppError::Training(format!(
            "{} fit panicked: {}",
            params.family(),
            message
        )))
    })
}
