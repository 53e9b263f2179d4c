//! Persistence of fitted artifacts and run records.
//!
//! Binary artifacts are bincode, audit records are pretty JSON. Every file
//! handle lives inside one helper call so it is closed on every exit path.

use crate::config::ArtifactsConfig;
use crate::error::{AppError, Result};
use crate::ml::classifier::TrainedModel;
use crate::ml::codec::CategoryCodec;
use crate::ml::features::FeatureExtractor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Artifact directory with configured file names
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: ArtifactsConfig,
}

impl ArtifactStore {
    pub fn new(config: ArtifactsConfig) -> Self {
        Self { config }
    }

    /// Store rooted at `dir` with the default file names
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactsConfig {
            dir: dir.into(),
            ..ArtifactsConfig::default()
        })
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.vectorizer_file)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.encoder_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.model_file)
    }

    pub fn tuned_model_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.tuned_model_file)
    }

    pub fn results_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.results_file)
    }

    pub fn tuning_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.tuning_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.config.dir.join(&self.config.metrics_file)
    }

    pub fn save_extractor(&self, extractor: &FeatureExtractor) -> Result<PathBuf> {
        write_bincode(self.vectorizer_path(), extractor)
    }

    pub fn load_extractor(&self) -> Result<FeatureExtractor> {
        let path = self.vectorizer_path();
        let extractor: FeatureExtractor = read_bincode(&path)?;
        if !extractor.is_fitted() {
            return Err(AppError::artifact(&path, "feature extractor was never fitted"));
        }
        Ok(extractor)
    }

    pub fn save_codec(&self, codec: &CategoryCodec) -> Result<PathBuf> {
        write_bincode(self.encoder_path(), codec)
    }

    pub fn load_codec(&self) -> Result<CategoryCodec> {
        let path = self.encoder_path();
        let codec = read_bincode::<CategoryCodec>(&path)?.restore();
        if codec.n_classes() == 0 {
            return Err(AppError::artifact(&path, "label encoder has no categories"));
        }
        Ok(codec)
    }

    pub fn save_model(&self, model: &TrainedModel) -> Result<PathBuf> {
        write_bincode(self.model_path(), model)
    }

    pub fn save_tuned_model(&self, model: &TrainedModel) -> Result<PathBuf> {
        write_bincode(self.tuned_model_path(), model)
    }

    /// The tuned model when present, otherwise the selected one
    pub fn load_serving_model(&self) -> Result<TrainedModel> {
        let tuned = self.tuned_model_path();
        if tuned.exists() {
            return read_bincode(&tuned);
        }
        debug!(path = %tuned.display(), "No tuned model, falling back to selected model");
        read_bincode(&self.model_path())
    }

    pub fn save_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
        write_json(path, value)
    }

    pub fn load_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        read_json(path)
    }
}

/// Serialize to a bincode file, creating parent directories
pub fn write_bincode<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut writer = create(path)?;
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;

    info!(path = %path.display(), "💾 Artifact saved");
    Ok(path.to_path_buf())
}

/// Deserialize a bincode file; any failure is an artifact load error
pub fn read_bincode<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AppError::artifact(path, e))?;
    let reader = BufReader::new(file);
    bincode::deserialize_from(reader).map_err(|e| AppError::artifact(path, e))
}

/// Serialize to pretty JSON, creating parent directories
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;

    info!(path = %path.display(), "Record written");
    Ok(path.to_path_buf())
}

/// Read a JSON record
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AppError::artifact(path, e))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| AppError::artifact(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
