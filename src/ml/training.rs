use crate::error::Result;
use crate::ml::artifacts;
use crate::ml::classifier::{ClassifierState, LogisticRegression};
use crate::ml::dataset::{class_counts, load_corpora, stratified_split, LabeledMessage};
use crate::ml::models::{Label, ModelMetrics, TrainingConfig};
use crate::ml::vectorizer::{TfidfVectorizer, VectorizerState};
use crate::nlp::TextNormalizer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summary of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_messages: usize,
    pub n_spam: usize,
    pub n_ham: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub vocabulary_size: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Metrics on the held-out split
    pub metrics: ModelMetrics,
    pub duration_ms: u64,
}

/// Output of a training run: both fitted states and their evaluation
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub vectorizer: VectorizerState,
    pub classifier: ClassifierState,
    pub report: TrainingReport,
}

impl TrainedModel {
    /// Persist both artifacts
    pub fn save(&self, vectorizer_path: &Path, model_path: &Path) -> Result<()> {
        artifacts::save(&self.vectorizer, vectorizer_path)?;
        artifacts::save(&self.classifier, model_path)?;
        Ok(())
    }
}

/// Runs load → normalize → split → fit → train → evaluate
pub struct TrainingPipeline {
    normalizer: TextNormalizer,
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(normalizer: TextNormalizer, config: TrainingConfig) -> Self {
        Self { normalizer, config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Load the configured corpora and train on them
    pub fn run_from_config(&self) -> Result<TrainedModel> {
        let messages = load_corpora(&self.config.datasets)?;
        self.run(&messages)
    }

    /// Train and evaluate on labelled messages.
    ///
    /// The vectorizer only ever sees the training split.
    pub fn run(&self, messages: &[LabeledMessage]) -> Result<TrainedModel> {
        let started = Instant::now();
        let (n_ham, n_spam) = class_counts(messages);
        info!(
            messages = messages.len(),
            spam = n_spam,
            ham = n_ham,
            "🚀 Starting training run"
        );

        let cleaned: Vec<String> = messages
            .par_iter()
            .map(|m| self.normalizer.normalize(&m.text))
            .collect();
        let labels: Vec<Label> = messages.iter().map(|m| m.label).collect();
        debug!(documents = cleaned.len(), "Normalized corpus");

        let split = stratified_split(&labels, self.config.test_size, self.config.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            seed = self.config.seed,
            "Split corpus"
        );

        let train_texts: Vec<&str> = split.train.iter().map(|&i| cleaned[i].as_str()).collect();
        let train_labels: Vec<u8> = split.train.iter().map(|&i| labels[i].as_int()).collect();

        let vectorizer = TfidfVectorizer::new(self.config.max_features).fit(&train_texts)?;
        info!(
            vocabulary_size = vectorizer.vocabulary_size(),
            max_features = self.config.max_features,
            "Fitted TF-IDF vectorizer"
        );

        let x_train = vectorizer.transform_batch(&train_texts);
        let classifier = LogisticRegression::from_config(&self.config).train(&x_train, &train_labels)?;
        if classifier.converged {
            info!(iterations = classifier.iterations, "Trained logistic regression");
        } else {
            warn!(
                iterations = classifier.iterations,
                max_iter = self.config.max_iter,
                "Logistic regression stopped before reaching tolerance"
            );
        }

        let test_texts: Vec<&str> = split.test.iter().map(|&i| cleaned[i].as_str()).collect();
        let test_labels: Vec<Label> = split.test.iter().map(|&i| labels[i]).collect();
        let metrics = evaluate(&vectorizer, &classifier, &test_texts, &test_labels)?;

        let report = TrainingReport {
            n_messages: messages.len(),
            n_spam,
            n_ham,
            n_train: split.train.len(),
            n_test: split.test.len(),
            vocabulary_size: vectorizer.vocabulary_size(),
            iterations: classifier.iterations,
            converged: classifier.converged,
            metrics,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            accuracy = report.metrics.accuracy,
            precision = report.metrics.precision,
            recall = report.metrics.recall,
            f1 = report.metrics.f1_score,
            duration_ms = report.duration_ms,
            "✅ Training completed"
        );

        Ok(TrainedModel {
            vectorizer,
            classifier,
            report,
        })
    }
}

/// Score cleaned texts and compare against their labels
pub fn evaluate(
    vectorizer: &VectorizerState,
    classifier: &ClassifierState,
    cleaned_texts: &[&str],
    labels: &[Label],
) -> Result<ModelMetrics> {
    let predictions = vectorizer
        .transform_batch(cleaned_texts)
        .iter()
        .map(|x| classifier.predict(x).map(|p| p.label))
        .collect::<Result<Vec<Label>>>()?;

    ModelMetrics::from_predictions(labels, &predictions)
}
