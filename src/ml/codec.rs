use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Bijection between category labels and dense indices `0..K`.
///
/// Labels are indexed in lexicographic order, so two fits over the same
/// label set always produce the same encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryCodec {
    classes: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PartialEq for CategoryCodec {
    fn eq(&self, other: &Self) -> bool {
        self.classes == other.classes
    }
}

impl CategoryCodec {
    /// Fit on a label sequence
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self::from_classes(classes)
    }

    fn from_classes(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { classes, index }
    }

    /// Rebuild the lookup table after deserialization
    pub fn restore(self) -> Self {
        Self::from_classes(self.classes)
    }

    /// Index of a label seen at fit time
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| AppError::UnknownLabel(label.to_string()))
    }

    /// Encode a whole label column
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    /// Label for an index in `0..K`
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(AppError::IndexOutOfRange {
                index,
                len: self.classes.len(),
            })
    }

    /// Number of categories (`K`)
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Labels in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
