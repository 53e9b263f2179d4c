//! Serving-side prediction over frozen artifacts.
//!
//! An [`InferenceContext`] is built once at startup and shared read-only
//! across requests; nothing in it is mutated after construction.

use crate::error::{AppError, Result};
use crate::ml::artifacts::ArtifactStore;
use crate::ml::classifier::{argmax_rows, Classifier, TrainedModel};
use crate::ml::codec::CategoryCodec;
use crate::ml::features::FeatureExtractor;
use crate::ml::text::TextPreprocessor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Marker reported when the model has no probability estimates
pub const CONFIDENCE_UNAVAILABLE: &str = "N/A";

/// Probability of the predicted class, or unavailable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Score(f64),
    Unavailable,
}

impl Confidence {
    pub fn score(&self) -> Option<f64> {
        match self {
            Confidence::Score(p) => Some(*p),
            Confidence::Unavailable => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(p) => write!(f, "{:.4}", p),
            Confidence::Unavailable => f.write_str(CONFIDENCE_UNAVAILABLE),
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Confidence::Score(p) => serializer.serialize_f64(*p),
            Confidence::Unavailable => serializer.serialize_str(CONFIDENCE_UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Score(f64),
            Marker(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Score(p) => Ok(Confidence::Score(p)),
            Wire::Marker(s) if s == CONFIDENCE_UNAVAILABLE => Ok(Confidence::Unavailable),
            Wire::Marker(s) => Err(serde::de::Error::custom(format!(
                "expected a probability or \"{}\", got \"{}\"",
                CONFIDENCE_UNAVAILABLE, s
            ))),
        }
    }
}

/// Outcome of classifying one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPrediction {
    pub category: String,
    pub confidence: Confidence,
    /// Full distribution over categories when the model provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// Reject a ticket whose subject and description are both blank
pub fn validate_ticket_text(subject: Option<&str>, description: Option<&str>) -> Result<()> {
    let blank = |s: Option<&str>| s.map_or(true, |s| s.trim().is_empty());
    if blank(subject) && blank(description) {
        return Err(AppError::Validation(
            "subject and description cannot both be empty".to_string(),
        ));
    }
    Ok(())
}

/// Frozen extractor, codec and classifier
#[derive(Debug)]
pub struct InferenceContext {
    extractor: FeatureExtractor,
    codec: CategoryCodec,
    model: TrainedModel,
}

impl InferenceContext {
    /// Assemble a context from fitted parts, checking they agree
    pub fn new(extractor: FeatureExtractor, codec: CategoryCodec, model: TrainedModel) -> Result<Self> {
        Self::check_consistency(&extractor, &codec, &model).map_err(AppError::Internal)?;
        Ok(Self {
            extractor,
            codec,
            model,
        })
    }

    /// Load the three artifacts; any missing, corrupt or mismatched file is
    /// an artifact load error
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let extractor = store.load_extractor()?;
        let codec = store.load_codec()?;
        let model = store.load_serving_model()?;

        Self::check_consistency(&extractor, &codec, &model)
            .map_err(|message| AppError::artifact(store.dir(), message))?;

        info!(
            dir = %store.dir().display(),
            family = %model.family(),
            vocabulary = extractor.vocab_size(),
            categories = codec.n_classes(),
            "✅ Inference artifacts loaded"
        );

        Ok(Self {
            extractor,
            codec,
            model,
        })
    }

    fn check_consistency(
        extractor: &FeatureExtractor,
        codec: &CategoryCodec,
        model: &TrainedModel,
    ) -> std::result::Result<(), String> {
        if !extractor.is_fitted() {
            return Err("feature extractor was never fitted".to_string());
        }
        if model.n_classes() != codec.n_classes() {
            return Err(format!(
                "model predicts {} categories but the label encoder knows {}",
                model.n_classes(),
                codec.n_classes()
            ));
        }
        if model.n_features() != extractor.vocab_size() {
            return Err(format!(
                "model expects {} features but the vocabulary has {} terms",
                model.n_features(),
                extractor.vocab_size()
            ));
        }
        Ok(())
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn codec(&self) -> &CategoryCodec {
        &self.codec
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Classify one ticket from its raw fields
    pub fn predict(&self, subject: &str, description: &str) -> Result<TicketPrediction> {
        let text = TextPreprocessor::compose(subject, description);
        let mut predictions = self.predict_texts(&[text])?;
        predictions
            .pop()
            .ok_or_else(|| AppError::Internal("classifier returned no prediction".to_string()))
    }

    /// Classify already composed document texts
    pub fn predict_texts<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Result<Vec<TicketPrediction>> {
        let features = self.extractor.transform(texts)?.to_dense();
        let proba = self.model.predict_proba(&features)?;
        let indices = match &proba {
            Some(p) => argmax_rows(p),
            None => self.model.predict(&features)?,
        };

        indices
            .iter()
            .enumerate()
            .map(|(row, &index)| {
                let category = self.codec.decode(index)?.to_string();
                let (confidence, probabilities) = match &proba {
                    Some(p) => {
                        let distribution = self
                            .codec
                            .classes()
                            .iter()
                            .enumerate()
                            .map(|(k, label)| (label.clone(), p[[row, k]]))
                            .collect();
                        (Confidence::Score(p[[row, index]]), Some(distribution))
                    }
                    None => (Confidence::Unavailable, None),
                };

                debug!(category = %category, confidence = %confidence, "Ticket classified");
                Ok(TicketPrediction {
                    category,
                    confidence,
                    probabilities,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::{FeatureConfig, ForestConfig, HyperParameters, LogisticSolver};

    fn corpus() -> (Vec<String>, Vec<&'static str>) {
        let rows = [
            ("Login failed", "cannot login password rejected", "Bug Report"),
            ("Crash on start", "app crashes error on launch", "Bug Report"),
            ("Error page", "error crash when saving", "Bug Report"),
            ("Invoice wrong", "charged twice on my invoice refund", "Billing Inquiry"),
            ("Refund please", "refund the duplicate charge", "Billing Inquiry"),
            ("Billing question", "invoice amount charge unclear", "Billing Inquiry"),
            ("Dark mode", "please add dark mode feature", "Feature Request"),
            ("Export idea", "add export to csv feature", "Feature Request"),
            ("New feature", "would love a calendar feature", "Feature Request"),
        ];
        let texts = rows
            .iter()
            .map(|(s, d, _)| TextPreprocessor::compose(s, d))
            .collect();
        let labels = rows.iter().map(|(_, _, c)| *c).collect();
        (texts, labels)
    }

    fn context(params: &HyperParameters) -> InferenceContext {
        let (texts, labels) = corpus();
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        let x = extractor.fit_transform(&texts).unwrap().to_dense();
        let codec = CategoryCodec::fit(&labels);
        let y = codec.encode_all(&labels).unwrap();
        let model = TrainedModel::fit(&x, &y, codec.n_classes(), params).unwrap();
        InferenceContext::new(extractor, codec, model).unwrap()
    }

    #[test]
    fn test_predict_with_probabilities() {
        let ctx = context(&HyperParameters::LogisticRegression {
            c: 10.0,
            solver: LogisticSolver::Lbfgs,
        });

        let prediction = ctx.predict("Refund", "I was charged twice, refund my invoice").unwrap();
        assert!(ctx.codec().classes().contains(&prediction.category));

        let p = prediction.confidence.score().unwrap();
        assert!((0.0..=1.0).contains(&p));
        let distribution = prediction.probabilities.unwrap();
        assert_eq!(distribution.len(), 3);
        assert!((distribution.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert_eq!(distribution[&prediction.category], p);
    }

    #[test]
    fn test_category_is_most_probable_class() {
        let forest = ForestConfig::default();
        let families = [
            HyperParameters::LogisticRegression {
                c: 1.0,
                solver: LogisticSolver::Liblinear,
            },
            HyperParameters::RandomForest {
                n_trees: 10,
                max_depth: None,
                feature_fraction: forest.feature_fraction,
                seed: forest.seed,
            },
        ];
        let (texts, _) = corpus();

        for params in &families {
            let ctx = context(params);
            let features = ctx.extractor().transform(&texts).unwrap().to_dense();
            let expected = ctx.model().predict(&features).unwrap();

            for (prediction, index) in ctx.predict_texts(&texts).unwrap().iter().zip(expected) {
                assert_eq!(prediction.category, ctx.codec().decode(index).unwrap());
                let distribution = prediction.probabilities.as_ref().unwrap();
                let best = distribution.values().cloned().fold(f64::MIN, f64::max);
                assert_eq!(prediction.confidence.score(), Some(best));
            }
        }
    }

    #[test]
    fn test_margin_model_reports_unavailable() {
        let ctx = context(&HyperParameters::LinearSvm { c: 1.0 });

        let prediction = ctx.predict("Login failed", "").unwrap();
        assert_eq!(prediction.confidence, Confidence::Unavailable);
        assert!(prediction.probabilities.is_none());
    }

    #[test]
    fn test_out_of_vocabulary_text_still_predicts() {
        let forest = ForestConfig::default();
        let ctx = context(&HyperParameters::RandomForest {
            n_trees: 10,
            max_depth: None,
            feature_fraction: forest.feature_fraction,
            seed: forest.seed,
        });

        let prediction = ctx.predict("zzqx", "wvvq").unwrap();
        assert!(ctx.codec().classes().contains(&prediction.category));
    }

    #[test]
    fn test_mismatched_parts_are_rejected() {
        let ctx = context(&HyperParameters::LinearSvm { c: 1.0 });
        let InferenceContext { extractor, model, .. } = ctx;

        let codec = CategoryCodec::fit(&["Only"]);
        let err = InferenceContext::new(extractor, codec, model).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_validate_ticket_text() {
        assert!(validate_ticket_text(Some("Login"), None).is_ok());
        assert!(validate_ticket_text(None, Some("body")).is_ok());
        assert!(matches!(
            validate_ticket_text(Some("  "), None),
            Err(AppError::Validation(_))
        ));
        assert!(validate_ticket_text(None, None).is_err());
    }

    #[test]
    fn test_confidence_wire_format() {
        assert_eq!(serde_json::to_string(&Confidence::Score(0.5)).unwrap(), "0.5");
        assert_eq!(
            serde_json::to_string(&Confidence::Unavailable).unwrap(),
            "\"N/A\""
        );
        let back: Confidence = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(back, Confidence::Unavailable);
        let back: Confidence = serde_json::from_str("0.25").unwrap();
        assert_eq!(back, Confidence::Score(0.25));
        assert!(serde_json::from_str::<Confidence>("\"high\"").is_err());
    }
}
