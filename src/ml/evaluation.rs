use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::codec::CategoryCodec;
use crate::ml::metrics;
use crate::ml::models::{ConfusionMatrix, EvaluationConfig, ModelMetrics};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Held-out evaluation record (`metrics.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub f1_score: f64,
    pub average_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub confusion_matrix: ConfusionMatrix,
    #[serde(default)]
    pub report: ModelMetrics,
}

/// Latency summary of the single-row benchmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub p95_ms: f64,
}

/// Measures a frozen model on the test set
pub struct ModelEvaluator {
    config: EvaluationConfig,
}

impl ModelEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// Time single-row predictions, cycling through the test rows
    pub fn benchmark<C: Classifier + ?Sized>(&self, model: &C, test_x: &Array2<f64>) -> Result<LatencyStats> {
        let n = test_x.nrows();
        if n == 0 {
            return Err(AppError::Validation("cannot benchmark on an empty test set".to_string()));
        }

        let first = test_x.slice(s![0..1, ..]).to_owned();
        for _ in 0..self.config.warmup_iterations {
            model.predict(&first)?;
        }

        let mut latencies = Vec::with_capacity(self.config.iterations);
        for i in 0..self.config.iterations {
            let idx = i % n;
            let row = test_x.slice(s![idx..idx + 1, ..]).to_owned();
            let started = Instant::now();
            model.predict(&row)?;
            latencies.push(started.elapsed().as_secs_f64() * 1000.0);
        }

        let mean_ms = latencies.iter().sum::<f64>() / latencies.len().max(1) as f64;
        let p95_ms = percentile(&mut latencies, 95.0);
        Ok(LatencyStats { mean_ms, p95_ms })
    }

    /// Latency benchmark plus accuracy, weighted F1 and confusion matrix
    pub fn evaluate<C: Classifier + ?Sized>(
        &self,
        model: &C,
        test_x: &Array2<f64>,
        test_y: &[usize],
        codec: &CategoryCodec,
    ) -> Result<EvaluationReport> {
        info!(
            rows = test_x.nrows(),
            iterations = self.config.iterations,
            "Measuring latency"
        );
        let latency = self.benchmark(model, test_x)?;
        info!(
            average_ms = latency.mean_ms,
            p95_ms = latency.p95_ms,
            "Latency measured"
        );

        let predictions = model.predict(test_x)?;
        let report = metrics::evaluate(test_y, &predictions, codec);
        let confusion = metrics::confusion_matrix(test_y, &predictions, codec);

        info!(
            accuracy = report.accuracy,
            f1 = report.f1_score,
            "📊 Evaluation complete"
        );

        Ok(EvaluationReport {
            accuracy: report.accuracy,
            f1_score: report.f1_score,
            average_latency_ms: latency.mean_ms,
            p95_latency_ms: latency.p95_ms,
            confusion_matrix: confusion,
            report,
        })
    }
}

/// Percentile with linear interpolation between closest ranks
fn percentile(values: &mut [f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let rank = pct / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}
