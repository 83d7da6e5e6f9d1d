use crate::error::{AppError, Result};
use crate::ml::dataset::DatasetConfig;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labelled corpora to train on
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,

    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the stratified split
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Inverse regularization strength (C)
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Maximum solver iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Relative gradient-norm tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            max_features: default_max_features(),
            test_size: default_test_size(),
            seed: default_seed(),
            regularization: default_regularization(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_max_features() -> usize {
    3000
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_regularization() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-4
}

/// Binary message class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Legitimate message (0)
    Ham,
    /// Spam message (1)
    Spam,
}

impl Label {
    /// Integer encoding: ham = 0, spam = 1
    pub fn as_int(self) -> u8 {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }

    pub fn from_int(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Label::Ham),
            1 => Ok(Label::Spam),
            other => Err(AppError::Validation(format!(
                "Label must be 0 (ham) or 1 (spam), got {}",
                other
            ))),
        }
    }

    /// Both labels in index order
    pub fn all() -> [Label; 2] {
        [Label::Ham, Label::Spam]
    }

    fn index(self) -> usize {
        self.as_int() as usize
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Ham => write!(f, "ham"),
            Label::Spam => write!(f, "spam"),
        }
    }
}

/// Fixed-length feature vector stored as sorted (index, weight) pairs.
///
/// `dim` is the vocabulary size; entries not listed are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PersistedSparseVector", into = "PersistedSparseVector")]
pub struct SparseVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

/// Wire form, validated through [`SparseVector::new`] on the way in
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSparseVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<PersistedSparseVector> for SparseVector {
    type Error = AppError;

    fn try_from(persisted: PersistedSparseVector) -> Result<Self> {
        if persisted.indices.len() != persisted.values.len() {
            return Err(AppError::InvalidInput(format!(
                "Sparse vector has {} indices but {} values",
                persisted.indices.len(),
                persisted.values.len()
            )));
        }
        Self::new(
            persisted.dim,
            persisted.indices.into_iter().zip(persisted.values).collect(),
        )
    }
}

impl From<SparseVector> for PersistedSparseVector {
    fn from(vector: SparseVector) -> Self {
        Self {
            dim: vector.dim,
            indices: vector.indices,
            values: vector.values,
        }
    }
}

impl SparseVector {
    /// All-zero vector of the given length
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from entries; indices must be strictly ascending and below `dim`
    pub fn new(dim: usize, entries: Vec<(usize, f64)>) -> Result<Self> {
        let mut indices = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());

        for (idx, value) in entries {
            if idx >= dim {
                return Err(AppError::DimensionMismatch {
                    expected: dim,
                    actual: idx + 1,
                });
            }
            if indices.last().is_some_and(|&last| last >= idx) {
                return Err(AppError::InvalidInput(format!(
                    "Sparse indices must be strictly ascending (index {})",
                    idx
                )));
            }
            indices.push(idx);
            values.push(value);
        }

        Ok(Self {
            dim,
            indices,
            values,
        })
    }

    /// Caller guarantees ascending, in-range indices
    pub(crate) fn from_sorted(dim: usize, indices: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(indices.len(), values.len());
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(indices.last().map_or(true, |&last| last < dim));
        Self {
            dim,
            indices,
            values,
        }
    }

    /// Build from a dense slice, keeping non-zero entries
    pub fn from_dense(dense: &[f64]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| (i, *v))
            .unzip();

        Self {
            dim: dense.len(),
            indices,
            values,
        }
    }

    /// Vector length (vocabulary size)
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Iterate over stored (index, weight) pairs in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Weight at a position (zero when not stored)
    pub fn get(&self, idx: usize) -> f64 {
        match self.indices.binary_search(&idx) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Euclidean norm
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Dot product with a dense vector of the same length
    pub fn dot(&self, dense: ArrayView1<'_, f64>) -> f64 {
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    /// Expand into a dense array
    pub fn to_dense(&self) -> Array1<f64> {
        let mut dense = Array1::zeros(self.dim);
        for (i, v) in self.iter() {
            dense[i] = v;
        }
        dense
    }
}

/// Outcome of scoring one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class
    pub label: Label,

    /// Raw linear score `w·x + b`
    pub score: f64,

    /// Spam probability `1 / (1 + e^-score)`
    pub probability: f64,
}

impl PredictionResult {
    pub fn is_spam(&self) -> bool {
        self.label == Label::Spam
    }

    /// Probability of the predicted class
    pub fn confidence(&self) -> f64 {
        match self.label {
            Label::Spam => self.probability,
            Label::Ham => 1.0 - self.probability,
        }
    }
}

/// Model evaluation metrics (spam is the positive class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Precision
    pub precision: f64,

    /// Recall
    pub recall: f64,

    /// F1 score
    pub f1_score: f64,

    /// Confusion matrix, rows = actual {ham, spam}, columns = predicted {ham, spam}
    pub confusion_matrix: Array2<usize>,

    /// Per-class metrics
    pub per_class_metrics: BTreeMap<Label, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: Array2::zeros((2, 2)),
            per_class_metrics: BTreeMap::new(),
        }
    }

    /// Compute metrics from aligned true and predicted labels.
    ///
    /// Ratios with a zero denominator are reported as 0.0.
    pub fn from_predictions(y_true: &[Label], y_pred: &[Label]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AppError::Validation(format!(
                "Label count mismatch: {} true vs {} predicted",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Ok(Self::new());
        }

        let mut confusion = Array2::<usize>::zeros((2, 2));
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            confusion[[t.index(), p.index()]] += 1;
        }

        let correct = confusion[[0, 0]] + confusion[[1, 1]];
        let accuracy = correct as f64 / y_true.len() as f64;

        let per_class: BTreeMap<Label, ClassMetrics> = Label::all()
            .into_iter()
            .map(|label| (label, Self::class_metrics(&confusion, label.index())))
            .collect();

        let spam = &per_class[&Label::Spam];

        Ok(Self {
            accuracy,
            precision: spam.precision,
            recall: spam.recall,
            f1_score: spam.f1_score,
            confusion_matrix: confusion,
            per_class_metrics: per_class,
        })
    }

    fn class_metrics(confusion: &Array2<usize>, class_idx: usize) -> ClassMetrics {
        let tp = confusion[[class_idx, class_idx]];
        let predicted = confusion.column(class_idx).sum();
        let support = confusion.row(class_idx).sum();

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassMetrics {
            precision,
            recall,
            f1_score,
            support,
        }
    }

    /// Human-readable report: headline scores, confusion matrix and
    /// per-class breakdown.
    pub fn report(&self) -> String {
        let cm = &self.confusion_matrix;
        let mut out = String::new();

        out.push_str(&format!(
            "Accuracy:  {:.4} ({:.2}%)\n",
            self.accuracy,
            self.accuracy * 100.0
        ));
        out.push_str(&format!(
            "Precision: {:.4} ({:.2}%)\n",
            self.precision,
            self.precision * 100.0
        ));
        out.push_str(&format!(
            "Recall:    {:.4} ({:.2}%)\n",
            self.recall,
            self.recall * 100.0
        ));
        out.push_str(&format!(
            "F1-Score:  {:.4} ({:.2}%)\n\n",
            self.f1_score,
            self.f1_score * 100.0
        ));

        out.push_str("                Predicted\n");
        out.push_str("              Ham    Spam\n");
        out.push_str(&format!(
            "Actual Ham    {:<6} {:<6}\n",
            cm[[0, 0]],
            cm[[0, 1]]
        ));
        out.push_str(&format!(
            "       Spam   {:<6} {:<6}\n\n",
            cm[[1, 0]],
            cm[[1, 1]]
        ));

        out.push_str(&format!(
            "{:>8} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        for (label, m) in &self.per_class_metrics {
            out.push_str(&format!(
                "{:>8} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                label.to_string(),
                m.precision,
                m.recall,
                m.f1_score,
                m.support
            ));
        }

        out
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
