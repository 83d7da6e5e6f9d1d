use crate::error::{AppError, Result};
use crate::ml::artifacts;
use crate::ml::classifier::ClassifierState;
use crate::ml::models::PredictionResult;
use crate::ml::vectorizer::VectorizerState;
use crate::nlp::TextNormalizer;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Result of classifying one raw message
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Normalized text the prediction was made on
    pub cleaned_text: String,
    pub prediction: PredictionResult,
}

/// Read-only inference bundle: normalizer, fitted vectorizer and trained
/// classifier. Shared behind an `Arc` by request handlers.
#[derive(Debug, Clone)]
pub struct SpamDetector {
    normalizer: TextNormalizer,
    vectorizer: VectorizerState,
    classifier: ClassifierState,
}

impl SpamDetector {
    /// Bundle fitted states; the classifier must match the vocabulary size
    pub fn new(
        normalizer: TextNormalizer,
        vectorizer: VectorizerState,
        classifier: ClassifierState,
    ) -> Result<Self> {
        let expected = vectorizer.vocabulary_size();
        let actual = classifier.coefficients.len();
        if expected != actual {
            return Err(AppError::DimensionMismatch { expected, actual });
        }

        Ok(Self {
            normalizer,
            vectorizer,
            classifier,
        })
    }

    /// Load both artifacts from disk
    pub fn load(
        normalizer: TextNormalizer,
        vectorizer_path: &Path,
        model_path: &Path,
    ) -> Result<Self> {
        let vectorizer: VectorizerState = artifacts::load(vectorizer_path)?;
        let classifier: ClassifierState = artifacts::load(model_path)?;
        let detector = Self::new(normalizer, vectorizer, classifier)?;

        info!(
            vocabulary_size = detector.vocabulary_size(),
            vectorizer = %vectorizer_path.display(),
            model = %model_path.display(),
            "Loaded spam detector"
        );

        Ok(detector)
    }

    /// Normalize, vectorize and score a raw message
    pub fn classify(&self, text: &str) -> Result<Classification> {
        let cleaned_text = self.normalizer.normalize(text);
        let features = self.vectorizer.transform(&cleaned_text);
        let prediction = self.classifier.predict(&features)?;

        Ok(Classification {
            cleaned_text,
            prediction,
        })
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn vectorizer(&self) -> &VectorizerState {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &ClassifierState {
        &self.classifier
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }
}
