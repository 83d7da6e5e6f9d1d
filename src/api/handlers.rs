use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{Classification, ClassWeights};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        vocabulary_size: state.detector.vocabulary_size(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub vocabulary_size: usize,
}

/// Classify a message as spam or legitimate
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("Please enter some text".to_string()));
    }
    request.validate()?;

    let classification = state.detector.classify(&request.text)?;
    debug!(
        label = %classification.prediction.label,
        probability = classification.prediction.probability,
        "Classified message"
    );

    Ok(Json(PredictResponse::from(classification)))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    #[serde(default)]
    #[validate(length(max = 100000, message = "Text must be at most 100000 characters"))]
    pub text: String,
}

/// Prediction with probabilities expressed as percentages
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// "spam" or "ham"
    pub prediction: String,
    /// "SPAM" or "LEGITIMATE"
    pub label: String,
    pub confidence: f64,
    pub spam_probability: f64,
    pub ham_probability: f64,
    pub score: f64,
    pub cleaned_text: String,
}

impl From<Classification> for PredictResponse {
    fn from(classification: Classification) -> Self {
        let prediction = classification.prediction;
        let label = if prediction.is_spam() {
            "SPAM"
        } else {
            "LEGITIMATE"
        };

        Self {
            prediction: prediction.label.to_string(),
            label: label.to_string(),
            confidence: prediction.confidence() * 100.0,
            spam_probability: prediction.probability * 100.0,
            ham_probability: (1.0 - prediction.probability) * 100.0,
            score: prediction.score,
            cleaned_text: classification.cleaned_text,
        }
    }
}

/// Describe the loaded model
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let classifier = state.detector.classifier();
    let vectorizer = state.detector.vectorizer();

    Json(ModelInfoResponse {
        vocabulary_size: vectorizer.vocabulary_size(),
        max_features: vectorizer.max_features(),
        training_documents: vectorizer.n_documents(),
        bias: classifier.bias,
        class_weights: classifier.class_weights,
        regularization: classifier.hyperparameters.c,
        iterations: classifier.iterations,
        converged: classifier.converged,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub vocabulary_size: usize,
    pub max_features: usize,
    pub training_documents: usize,
    pub bias: f64,
    pub class_weights: ClassWeights,
    pub regularization: f64,
    pub iterations: usize,
    pub converged: bool,
}
