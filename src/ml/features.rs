use crate::error::{AppError, Result};
use crate::ml::models::FeatureConfig;
use crate::ml::text::TextPreprocessor;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Sparse document-term matrix: rows are documents, columns are vocabulary
/// terms, values are L2-normalized TF-IDF weights.
#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    matrix: sprs::CsMat<f64>,
}

impl DocumentTermMatrix {
    /// Number of documents
    pub fn n_rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Number of vocabulary columns
    pub fn n_cols(&self) -> usize {
        self.matrix.cols()
    }

    /// Number of stored non-zero weights
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Non-zero `(column, weight)` pairs of one row
    pub fn row(&self, index: usize) -> Vec<(usize, f64)> {
        self.matrix
            .outer_view(index)
            .map(|row| row.iter().map(|(col, &value)| (col, value)).collect())
            .unwrap_or_default()
    }

    /// True when a row carries no weight at all
    pub fn is_zero_row(&self, index: usize) -> bool {
        self.row(index).iter().all(|(_, v)| *v == 0.0)
    }

    /// Dense copy for the classifier boundary
    pub fn to_dense(&self) -> Array2<f64> {
        self.matrix.to_dense()
    }

    /// Underlying CSR matrix
    pub fn as_csr(&self) -> &sprs::CsMat<f64> {
        &self.matrix
    }
}

/// Vocabulary-bounded TF-IDF feature extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    /// Configuration
    config: FeatureConfig,

    /// Vocabulary mapping (term -> column index)
    vocabulary: HashMap<String, usize>,

    /// Column index -> term
    terms: Vec<String>,

    /// Inverse document frequency per column
    idf: Vec<f64>,

    /// Corpus size seen at fit time
    n_documents: usize,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl FeatureExtractor {
    /// Create a new, unfitted feature extractor
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            terms: Vec::new(),
            idf: Vec::new(),
            n_documents: 0,
            is_fitted: false,
        }
    }

    /// Build the vocabulary and IDF weights from a training corpus.
    ///
    /// Refitting discards the previous vocabulary entirely.
    pub fn fit<S: AsRef<str> + Sync>(&mut self, corpus: &[S]) -> Result<()> {
        let analyzed: Vec<Vec<String>> = corpus
            .par_iter()
            .map(|doc| self.analyze(doc.as_ref()))
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut term_freq: HashMap<&str, usize> = HashMap::new();

        for terms in &analyzed {
            let unique: HashSet<&str> = terms.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
            for term in terms {
                *term_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        // Rank by corpus-wide count, ties broken lexicographically
        let min_df = self.config.min_doc_freq.max(1);
        let mut ranked: Vec<(&str, usize)> = term_freq
            .into_iter()
            .filter(|(term, _)| doc_freq.get(term).copied().unwrap_or(0) >= min_df)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.max_features);

        let n_docs = corpus.len() as f64;
        self.terms = ranked.iter().map(|(term, _)| term.to_string()).collect();
        self.idf = ranked
            .iter()
            .map(|(term, _)| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.vocabulary = self
            .terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        self.n_documents = corpus.len();
        self.is_fitted = true;

        tracing::debug!(
            documents = corpus.len(),
            vocab_size = self.terms.len(),
            "Feature extractor fitted"
        );

        Ok(())
    }

    /// Project documents onto the frozen vocabulary.
    ///
    /// Out-of-vocabulary terms are dropped; a document without known terms
    /// becomes an all-zero row.
    pub fn transform<S: AsRef<str> + Sync>(&self, documents: &[S]) -> Result<DocumentTermMatrix> {
        if !self.is_fitted {
            return Err(AppError::NotFitted(
                "FeatureExtractor must be fitted before transform".to_string(),
            ));
        }

        let rows: Vec<Vec<(usize, f64)>> = documents
            .par_iter()
            .map(|doc| self.weigh(doc.as_ref()))
            .collect();

        let mut triplets: sprs::TriMat<f64> =
            sprs::TriMat::new((documents.len(), self.terms.len()));
        for (row_idx, row) in rows.into_iter().enumerate() {
            for (col, value) in row {
                triplets.add_triplet(row_idx, col, value);
            }
        }

        Ok(DocumentTermMatrix {
            matrix: triplets.to_csr(),
        })
    }

    /// Fit and transform in one step
    pub fn fit_transform<S: AsRef<str> + Sync>(
        &mut self,
        corpus: &[S],
    ) -> Result<DocumentTermMatrix> {
        self.fit(corpus)?;
        self.transform(corpus)
    }

    /// Normalize, tokenize, drop stop words and expand to n-grams
    fn analyze(&self, text: &str) -> Vec<String> {
        let normalized = TextPreprocessor::normalize(text);
        let tokens: Vec<String> = TextPreprocessor::tokenize(&normalized)
            .into_iter()
            .filter(|t| !self.config.stop_words || !TextPreprocessor::is_stop_word(t))
            .collect();

        TextPreprocessor::ngrams(&tokens, self.config.ngram_range)
    }

    /// TF-IDF weights of one document, L2-normalized, sorted by column
    fn weigh(&self, text: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let mut row: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, count)| (idx, count as f64 * self.idf[idx]))
            .collect();
        row.sort_by_key(|(idx, _)| *idx);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }

        row
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.terms.len()
    }

    /// Column index of a term, if retained
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Terms in column order
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// IDF weights in column order
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Number of documents the vocabulary was built from
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Configuration in use
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "App crashes on launch every time".to_string(),
            "Please add dark mode to the dashboard".to_string(),
            "I was charged twice on my invoice".to_string(),
            "The app crashes when I upload an invoice".to_string(),
        ]
    }

    #[test]
    fn test_feature_extractor_creation() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());

        assert!(!extractor.is_fitted());
        assert_eq!(extractor.vocab_size(), 0);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let result = extractor.transform(&["anything"]);

        assert!(matches!(result, Err(AppError::NotFitted(_))));
    }

    #[test]
    fn test_fit_builds_unigrams_and_bigrams() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        extractor.fit(&corpus()).unwrap();

        assert!(extractor.is_fitted());
        assert!(extractor.term_index("crashes").is_some());
        assert!(extractor.term_index("app crashes").is_some());
        assert!(extractor.term_index("the").is_none());
    }

    #[test]
    fn test_idf_formula() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        extractor.fit(&corpus()).unwrap();

        // "crashes" appears in 2 of 4 documents
        let idx = extractor.term_index("crashes").unwrap();
        let expected = (5.0f64 / 3.0).ln() + 1.0;
        assert!((extractor.idf()[idx] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_bounds_vocabulary() {
        let config = FeatureConfig {
            max_features: 3,
            ..FeatureConfig::default()
        };
        let mut extractor = FeatureExtractor::new(config);
        extractor.fit(&corpus()).unwrap();

        assert_eq!(extractor.vocab_size(), 3);
        // Four terms tie on count 2; lexicographic order decides the cut
        assert_eq!(extractor.terms(), ["app", "app crashes", "crashes"]);
        assert!(extractor.term_index("invoice").is_none());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let mut first = FeatureExtractor::new(FeatureConfig::default());
        let mut second = FeatureExtractor::new(FeatureConfig::default());
        first.fit(&corpus()).unwrap();
        second.fit(&corpus()).unwrap();

        assert_eq!(first.terms(), second.terms());
        assert_eq!(first.idf(), second.idf());
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        let matrix = extractor.fit_transform(&corpus()).unwrap();

        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(matrix.n_cols(), extractor.vocab_size());
        for i in 0..matrix.n_rows() {
            let norm: f64 = matrix.row(i).iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_out_of_vocabulary_document_is_zero() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        extractor.fit(&corpus()).unwrap();

        let matrix = extractor.transform(&["zebra quantum xylophone"]).unwrap();
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.n_cols(), extractor.vocab_size());
        assert_eq!(matrix.nnz(), 0);
        assert!(matrix.is_zero_row(0));
    }

    #[test]
    fn test_empty_corpus() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        let empty: Vec<String> = Vec::new();
        extractor.fit(&empty).unwrap();

        assert!(extractor.is_fitted());
        assert_eq!(extractor.vocab_size(), 0);

        let matrix = extractor.transform(&["some document"]).unwrap();
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.n_cols(), 0);
        assert!(matrix.is_zero_row(0));
    }

    #[test]
    fn test_dense_matches_sparse() {
        let mut extractor = FeatureExtractor::new(FeatureConfig::default());
        let matrix = extractor.fit_transform(&corpus()).unwrap();
        let dense = matrix.to_dense();

        assert_eq!(dense.dim(), (matrix.n_rows(), matrix.n_cols()));
        for (col, value) in matrix.row(2) {
            assert_eq!(dense[[2, col]], value);
        }
    }
}
