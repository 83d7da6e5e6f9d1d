/// Machine learning pipeline for spam/ham classification
///
/// This module provides:
/// - TF-IDF vectorization with a capped vocabulary
/// - Class-balanced logistic regression
/// - Corpus loading and stratified splitting
/// - Versioned artifact persistence
/// - Training orchestration and evaluation

pub mod artifacts;
pub mod classifier;
pub mod dataset;
pub mod detector;
pub mod models;
pub mod training;
pub mod vectorizer;

pub use classifier::{Classifier, ClassifierState, ClassWeights, LogisticRegression};
pub use dataset::{CorpusFormat, DatasetConfig, LabeledMessage, Split};
pub use detector::{Classification, SpamDetector};
pub use models::{
    ClassMetrics, Label, ModelMetrics, PredictionResult, SparseVector, TrainingConfig,
};
pub use training::{TrainedModel, TrainingPipeline, TrainingReport};
pub use vectorizer::{TfidfVectorizer, VectorizerState};
