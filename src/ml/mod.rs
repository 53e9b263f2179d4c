/// Machine learning core for support-ticket classification
///
/// This module provides:
/// - Text normalization shared by training and serving
/// - Vocabulary-bounded TF-IDF feature extraction
/// - Category encoding
/// - Model selection across classifier families
/// - Cross-validated hyperparameter search
/// - Inference over frozen artifacts and held-out evaluation

pub mod artifacts;
pub mod classifier;
pub mod codec;
pub mod evaluation;
pub mod features;
pub mod inference;
pub mod metrics;
pub mod models;
pub mod selection;
pub mod service;
pub mod text;
pub mod tuning;

pub use artifacts::ArtifactStore;
pub use classifier::{Classifier, TrainedClassifier, TrainedModel};
pub use codec::CategoryCodec;
pub use evaluation::{EvaluationReport, ModelEvaluator};
pub use features::{DocumentTermMatrix, FeatureExtractor};
pub use inference::{validate_ticket_text, Confidence, InferenceContext, TicketPrediction};
pub use models::{
    EvaluationConfig, FeatureConfig, ForestConfig, HyperParameters, LogisticSolver, ModelFamily,
    ModelMetadata, ModelMetrics, SelectionConfig, TuningConfig,
};
pub use selection::{ModelSelector, Selection, SelectionReport};
pub use service::{FeatureSet, PipelineSummary, TrainingService};
pub use text::TextPreprocessor;
pub use tuning::{HyperparameterOptimizer, StratifiedKFold, Tuned, TuningReport};
