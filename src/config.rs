use crate::error::{AppError, Result};
use crate::ml::models::{EvaluationConfig, FeatureConfig, SelectionConfig, TuningConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Artifact locations
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Training corpus configuration
    #[serde(default)]
    #[validate(nested)]
    pub data: DataConfig,

    /// Feature extraction configuration
    #[serde(default)]
    #[validate(nested)]
    pub features: FeatureConfig,

    /// Model selection configuration
    #[serde(default)]
    #[validate(nested)]
    pub selection: SelectionConfig,

    /// Hyperparameter search configuration
    #[serde(default)]
    #[validate(nested)]
    pub tuning: TuningConfig,

    /// Held-out evaluation configuration
    #[serde(default)]
    #[validate(nested)]
    pub evaluation: EvaluationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("TRIAGE_CONFIG_PATH").unwrap_or_else(|_| "config/triage.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: TRIAGE_)
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.check()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.check()?;
        Ok(config)
    }

    /// Validate ranges; any violation is a configuration error
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        self.features
            .check_ngram_range()
            .map_err(AppError::Configuration)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding every artifact and record
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_vectorizer_file")]
    pub vectorizer_file: String,

    #[serde(default = "default_encoder_file")]
    pub encoder_file: String,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_tuned_model_file")]
    pub tuned_model_file: String,

    #[serde(default = "default_results_file")]
    pub results_file: String,

    #[serde(default = "default_tuning_file")]
    pub tuning_file: String,

    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            vectorizer_file: default_vectorizer_file(),
            encoder_file: default_encoder_file(),
            model_file: default_model_file(),
            tuned_model_file: default_tuned_model_file(),
            results_file: default_results_file(),
            tuning_file: default_tuning_file(),
            metrics_file: default_metrics_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    /// Ticket corpus CSV
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,

    /// Share of each category held out for testing
    #[serde(default = "default_test_size")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,

    /// Shuffle seed for the split
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// When set, the train/test split is written here as CSV
    #[serde(default)]
    pub processed_dir: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            test_size: default_test_size(),
            seed: default_seed(),
            processed_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5001
}

fn default_request_timeout() -> u64 {
    30
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_vectorizer_file() -> String {
    "tfidf_vectorizer.bin".to_string()
}

fn default_encoder_file() -> String {
    "label_encoder.bin".to_string()
}

fn default_model_file() -> String {
    "best_model.bin".to_string()
}

fn default_tuned_model_file() -> String {
    "best_model_tuned.bin".to_string()
}

fn default_results_file() -> String {
    "results.json".to_string()
}

fn default_tuning_file() -> String {
    "tuning.json".to_string()
}

fn default_metrics_file() -> String {
    "metrics.json".to_string()
}

fn default_raw_path() -> PathBuf {
    PathBuf::from("data/raw/tickets.csv")
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "ticket-triage-api".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::ModelFamily;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 5001);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_test_size(), 0.2);
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::from_toml_str(include_str!("../config/default.toml")).unwrap();

        assert_eq!(config.server.http_port, 5001);
        assert_eq!(config.features.max_features, 5000);
        assert_eq!(config.tuning.cv_folds, 5);
        assert_eq!(config.tuning.family, ModelFamily::LogisticRegression);
        assert!(!config.tuning.tune_selected);
        assert_eq!(config.evaluation.iterations, 1000);
        assert_eq!(config.artifacts.tuned_model_file, "best_model_tuned.bin");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [features]
            max_features = 100

            [selection]
            families = ["linear_svm"]
            "#,
        )
        .unwrap();

        assert_eq!(config.features.max_features, 100);
        assert_eq!(config.features.ngram_range, (1, 2));
        assert_eq!(config.selection.families, vec![ModelFamily::LinearSvm]);
        assert_eq!(config.data.seed, 42);
    }

    #[test]
    fn test_invalid_ranges_are_configuration_errors() {
        let err = Config::from_toml_str("[data]\ntest_size = 1.5\n").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let err = Config::from_toml_str("[tuning]\ncv_folds = 1\n").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let err = Config::from_toml_str("[features]\nngram_range = [3, 1]\n").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
