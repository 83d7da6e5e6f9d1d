use crate::error::{AppError, Result};
use crate::ml::models::SparseVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// TF-IDF vectorizer configuration. `fit` produces an immutable
/// [`VectorizerState`].
#[derive(Debug, Clone, Copy)]
pub struct TfidfVectorizer {
    max_features: usize,
}

/// Per-token statistics gathered while fitting
#[derive(Debug, Clone, Copy, Default)]
struct TermStats {
    term_freq: usize,
    doc_freq: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    /// Build the vocabulary and IDF weights from a corpus of cleaned texts
    pub fn fit<S: AsRef<str>>(&self, corpus: &[S]) -> Result<VectorizerState> {
        if self.max_features == 0 {
            return Err(AppError::Configuration(
                "max_features must be at least 1".to_string(),
            ));
        }

        // First-seen order doubles as the tie-breaker for equal frequencies
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut terms: Vec<&str> = Vec::new();
        let mut stats: Vec<TermStats> = Vec::new();

        for doc in corpus {
            let mut seen: HashSet<usize> = HashSet::new();
            for token in doc.as_ref().split_whitespace() {
                let pos = *positions.entry(token).or_insert_with(|| {
                    terms.push(token);
                    stats.push(TermStats::default());
                    terms.len() - 1
                });
                stats[pos].term_freq += 1;
                if seen.insert(pos) {
                    stats[pos].doc_freq += 1;
                }
            }
        }

        let mut ranked: Vec<usize> = (0..terms.len()).collect();
        ranked.sort_by(|a, b| stats[*b].term_freq.cmp(&stats[*a].term_freq));
        ranked.truncate(self.max_features);

        let mut selected: Vec<(&str, usize)> = ranked
            .into_iter()
            .map(|pos| (terms[pos], stats[pos].doc_freq))
            .collect();
        selected.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let n_documents = corpus.len();
        let (terms, idf): (Vec<String>, Vec<f64>) = selected
            .into_iter()
            .map(|(term, df)| (term.to_string(), smoothed_idf(n_documents, df)))
            .unzip();

        VectorizerState::from_parts(terms, idf, self.max_features, n_documents)
    }
}

fn smoothed_idf(n_documents: usize, doc_freq: usize) -> f64 {
    ((1.0 + n_documents as f64) / (1.0 + doc_freq as f64)).ln() + 1.0
}

/// Fitted vocabulary and IDF weights.
///
/// Immutable after fit; `transform` takes `&self` and can be shared across
/// threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PersistedVectorizer", into = "PersistedVectorizer")]
pub struct VectorizerState {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
    max_features: usize,
    n_documents: usize,
}

/// On-disk form: terms in index order next to their IDF weights
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedVectorizer {
    terms: Vec<String>,
    idf: Vec<f64>,
    max_features: usize,
    n_documents: usize,
}

impl VectorizerState {
    fn from_parts(
        terms: Vec<String>,
        idf: Vec<f64>,
        max_features: usize,
        n_documents: usize,
    ) -> Result<Self> {
        if terms.len() != idf.len() {
            return Err(AppError::ArtifactFormat(format!(
                "Vectorizer has {} terms but {} idf weights",
                terms.len(),
                idf.len()
            )));
        }
        if max_features == 0 || terms.len() > max_features {
            return Err(AppError::ArtifactFormat(format!(
                "Vectorizer vocabulary of {} exceeds max_features {}",
                terms.len(),
                max_features
            )));
        }
        if let Some(bad) = idf.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(AppError::ArtifactFormat(format!(
                "Invalid idf weight {}",
                bad
            )));
        }

        let mut vocabulary = HashMap::with_capacity(terms.len());
        for (idx, term) in terms.iter().enumerate() {
            if term.is_empty() || term.chars().any(char::is_whitespace) {
                return Err(AppError::ArtifactFormat(format!(
                    "Invalid vocabulary term {:?}",
                    term
                )));
            }
            if vocabulary.insert(term.clone(), idx).is_some() {
                return Err(AppError::ArtifactFormat(format!(
                    "Duplicate vocabulary term '{}'",
                    term
                )));
            }
        }

        Ok(Self {
            vocabulary,
            terms,
            idf,
            max_features,
            n_documents,
        })
    }

    /// Map cleaned text to an L2-normalised TF-IDF vector.
    ///
    /// Out-of-vocabulary tokens are ignored; a text with no known token maps
    /// to the zero vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for token in text.split_whitespace() {
            if let Some(&idx) = self.vocabulary.get(token) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let (indices, mut values): (Vec<usize>, Vec<f64>) = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf as f64 * self.idf[idx]))
            .unzip();

        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }

        SparseVector::from_sorted(self.vocabulary_size(), indices, values)
    }

    /// Transform many texts in parallel; output order matches input order
    pub fn transform_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<SparseVector> {
        texts
            .par_iter()
            .map(|text| self.transform(text.as_ref()))
            .collect()
    }

    /// Number of features (V)
    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf_of(&self, term: &str) -> Option<f64> {
        self.index_of(term).map(|idx| self.idf[idx])
    }

    /// Vocabulary terms in index order
    pub fn feature_names(&self) -> &[String] {
        &self.terms
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    /// Number of documents the state was fitted on
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }
}

impl TryFrom<PersistedVectorizer> for VectorizerState {
    type Error = AppError;

    fn try_from(persisted: PersistedVectorizer) -> Result<Self> {
        Self::from_parts(
            persisted.terms,
            persisted.idf,
            persisted.max_features,
            persisted.n_documents,
        )
    }
}

impl From<VectorizerState> for PersistedVectorizer {
    fn from(state: VectorizerState) -> Self {
        Self {
            terms: state.terms,
            idf: state.idf,
            max_features: state.max_features,
            n_documents: state.n_documents,
        }
    }
}
