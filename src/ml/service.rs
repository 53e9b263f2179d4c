use crate::config::Config;
use crate::data::{self, stratified_split};
use crate::error::Result;
use crate::ml::artifacts::ArtifactStore;
use crate::ml::classifier::Classifier;
use crate::ml::codec::CategoryCodec;
use crate::ml::evaluation::{EvaluationReport, ModelEvaluator};
use crate::ml::features::FeatureExtractor;
use crate::ml::metrics;
use crate::ml::models::ModelFamily;
use crate::ml::selection::{ModelSelector, Selection, SelectionReport};
use crate::ml::tuning::{HyperparameterOptimizer, Tuned, TuningReport};
use crate::models::Ticket;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Encoded train/test matrices plus the fitted vocabulary and codec
#[derive(Debug)]
pub struct FeatureSet {
    pub extractor: FeatureExtractor,
    pub codec: CategoryCodec,
    pub train_x: Array2<f64>,
    pub train_y: Vec<usize>,
    pub test_x: Array2<f64>,
    pub test_y: Vec<usize>,
}

impl FeatureSet {
    pub fn n_classes(&self) -> usize {
        self.codec.n_classes()
    }
}

/// Records produced by a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub selection: SelectionReport,
    pub tuning: TuningReport,
    pub evaluation: EvaluationReport,
}

/// Training pipeline: corpus, features, selection, tuning, evaluation
pub struct TrainingService {
    config: Config,
    store: ArtifactStore,
}

impl TrainingService {
    pub fn new(config: Config) -> Self {
        let store = ArtifactStore::new(config.artifacts.clone());
        Self { config, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the raw corpus and split it, writing the split out when a
    /// processed directory is configured
    pub fn load_split(&self) -> Result<(Vec<Ticket>, Vec<Ticket>)> {
        let data = &self.config.data;
        let tickets = data::load_tickets(&data.raw_path)?;
        let (train, test) = stratified_split(&tickets, data.test_size, data.seed)?;

        if let Some(dir) = &data.processed_dir {
            data::write_tickets(dir.join("train.csv"), &train)?;
            data::write_tickets(dir.join("test.csv"), &test)?;
        }

        Ok((train, test))
    }

    /// Fit the vocabulary and codec on the training split, encode both
    /// splits and persist the fitted extractor and codec
    pub fn build_features(&self, train: &[Ticket], test: &[Ticket]) -> Result<FeatureSet> {
        let started = Instant::now();

        let train_texts: Vec<String> = train.iter().map(Ticket::text).collect();
        let mut extractor = FeatureExtractor::new(self.config.features.clone());
        extractor.fit(&train_texts)?;

        let codec = CategoryCodec::fit(&categories(train));
        let features = encode(extractor, codec, train, test)?;

        self.store.save_extractor(&features.extractor)?;
        self.store.save_codec(&features.codec)?;

        info!(
            vocabulary = features.extractor.vocab_size(),
            categories = features.n_classes(),
            train = features.train_x.nrows(),
            test = features.test_x.nrows(),
            secs = started.elapsed().as_secs_f64(),
            "Features built"
        );
        Ok(features)
    }

    /// Encode both splits with the persisted extractor and codec
    pub fn load_features(&self, train: &[Ticket], test: &[Ticket]) -> Result<FeatureSet> {
        let extractor = self.store.load_extractor()?;
        let codec = self.store.load_codec()?;
        encode(extractor, codec, train, test)
    }

    /// Train every configured family and persist the winner and `results.json`
    pub fn train_models(&self, features: &FeatureSet) -> Result<Selection> {
        let selector = ModelSelector::new(self.config.selection.clone());
        let selection = selector.select(
            &features.train_x,
            &features.train_y,
            &features.test_x,
            &features.test_y,
            features.n_classes(),
        )?;

        let predictions = selection.model.predict(&features.test_x)?;
        let report = metrics::evaluate(&features.test_y, &predictions, &features.codec);
        info!(
            family = %selection.model.family(),
            "Classification report\n{}",
            metrics::format_report(&report)
        );

        self.store.save_model(&selection.model)?;
        self.store
            .save_json(self.store.results_path(), &selection.report)?;
        Ok(selection)
    }

    /// Family the optimizer works on
    pub fn tuning_family(&self, selected: Option<ModelFamily>) -> ModelFamily {
        match selected {
            Some(family) if self.config.tuning.tune_selected => family,
            _ => self.config.tuning.family,
        }
    }

    /// Grid search, refit and persist `best_model_tuned.bin` and `tuning.json`
    pub fn optimize(&self, features: &FeatureSet, selected: Option<ModelFamily>) -> Result<Tuned> {
        let family = self.tuning_family(selected);
        debug!(family = %family, selected = ?selected, "Tuning family chosen");

        let optimizer = HyperparameterOptimizer::new(self.config.tuning.clone());
        let tuned = optimizer.optimize(
            family,
            &features.train_x,
            &features.train_y,
            &features.test_x,
            &features.test_y,
            features.n_classes(),
        )?;

        self.store.save_tuned_model(&tuned.model)?;
        self.store.save_json(self.store.tuning_path(), &tuned.report)?;
        Ok(tuned)
    }

    /// Evaluate the serving model on the test split and persist `metrics.json`
    pub fn evaluate(&self, features: &FeatureSet) -> Result<EvaluationReport> {
        let model = self.store.load_serving_model()?;
        let evaluator = ModelEvaluator::new(self.config.evaluation.clone());
        let report = evaluator.evaluate(&model, &features.test_x, &features.test_y, &features.codec)?;

        self.store.save_json(self.store.metrics_path(), &report)?;
        Ok(report)
    }

    /// Load, split, build features, select, tune and evaluate
    pub fn run_all(&self) -> Result<PipelineSummary> {
        let started = Instant::now();
        info!(corpus = %self.config.data.raw_path.display(), "🚀 Starting training pipeline");

        let (train, test) = self.load_split()?;
        let features = self.build_features(&train, &test)?;
        let selection = self.train_models(&features)?;
        let tuned = self.optimize(&features, Some(selection.report.best_family))?;
        let evaluation = self.evaluate(&features)?;

        info!(
            best_family = %selection.report.best_family,
            tuned_family = %tuned.report.family,
            accuracy = evaluation.accuracy,
            f1 = evaluation.f1_score,
            secs = started.elapsed().as_secs_f64(),
            "✅ Training pipeline completed"
        );

        Ok(PipelineSummary {
            selection: selection.report,
            tuning: tuned.report,
            evaluation,
        })
    }
}

fn categories(tickets: &[Ticket]) -> Vec<&str> {
    tickets.iter().map(|t| t.category.as_str()).collect()
}

fn encode(
    extractor: FeatureExtractor,
    codec: CategoryCodec,
    train: &[Ticket],
    test: &[Ticket],
) -> Result<FeatureSet> {
    let train_texts: Vec<String> = train.iter().map(Ticket::text).collect();
    let test_texts: Vec<String> = test.iter().map(Ticket::text).collect();

    let train_x = extractor.transform(&train_texts)?.to_dense();
    let test_x = extractor.transform(&test_texts)?.to_dense();
    let train_y = codec.encode_all(&categories(train))?;
    let test_y = codec.encode_all(&categories(test))?;

    Ok(FeatureSet {
        extractor,
        codec,
        train_x,
        train_y,
        test_x,
        test_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::ml::models::{HyperParameters, LogisticSolver};

    fn tickets() -> Vec<Ticket> {
        vec![
            Ticket::new("1", "Crash", "app crashes on start error", "Bug Report"),
            Ticket::new("2", "Error", "error when saving crash", "Bug Report"),
            Ticket::new("3", "Refund", "refund my invoice charge", "Billing Inquiry"),
            Ticket::new("4", "Invoice", "invoice charged twice", "Billing Inquiry"),
        ]
    }

    fn service(dir: &std::path::Path) -> TrainingService {
        let mut config = Config::default();
        config.artifacts.dir = dir.to_path_buf();
        TrainingService::new(config)
    }

    #[test]
    fn test_build_features_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let tickets = tickets();

        let built = service.build_features(&tickets, &tickets[..2]).unwrap();
        assert_eq!(built.n_classes(), 2);
        assert_eq!(built.train_x.ncols(), built.extractor.vocab_size());
        assert_eq!(built.test_y, vec![1, 1]);

        let reloaded = service.load_features(&tickets, &tickets[..2]).unwrap();
        assert_eq!(reloaded.train_x, built.train_x);
        assert_eq!(reloaded.codec, built.codec);
    }

    #[test]
    fn test_unseen_test_label_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let tickets = tickets();
        let odd = vec![Ticket::new("5", "Idea", "add dark mode", "Feature Request")];

        let err = service.build_features(&tickets, &odd).unwrap_err();
        assert!(matches!(err, AppError::UnknownLabel(_)));
    }

    #[test]
    fn test_tuning_family_honours_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service(dir.path());
        assert_eq!(
            service.tuning_family(Some(ModelFamily::RandomForest)),
            ModelFamily::LogisticRegression
        );

        service.config.tuning.tune_selected = true;
        assert_eq!(
            service.tuning_family(Some(ModelFamily::RandomForest)),
            ModelFamily::RandomForest
        );
        assert_eq!(service.tuning_family(None), ModelFamily::LogisticRegression);
    }

    #[test]
    fn test_evaluate_prefers_tuned_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service(dir.path());
        service.config.evaluation.iterations = 5;
        let tickets = tickets();
        let features = service.build_features(&tickets, &tickets).unwrap();

        let params = HyperParameters::LogisticRegression {
            c: 10.0,
            solver: LogisticSolver::Lbfgs,
        };
        let model = crate::ml::classifier::TrainedModel::fit(
            &features.train_x,
            &features.train_y,
            features.n_classes(),
            &params,
        )
        .unwrap();
        service.store().save_tuned_model(&model).unwrap();

        let report = service.evaluate(&features).unwrap();
        assert_eq!(report.confusion_matrix.total(), 4);
        assert!(service.store().metrics_path().exists());
    }
}
