use crate::error::{AppError, Result};
use crate::ml::models::TrainingConfig;
use crate::nlp::LexiconConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where fitted states are written and read
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Training protocol and hyper-parameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Stopword and lemma table overrides
    #[serde(default)]
    pub lexicon: LexiconConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the bundled defaults, the file named by
    /// `CONFIG_PATH` (if any) and `SPAM_DETECTOR__*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load configuration with an explicit override file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Config = builder
            // Override with environment variables (prefix: SPAM_DETECTOR__)
            .add_source(
                config::Environment::with_prefix("SPAM_DETECTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the training pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;

        if training.max_features == 0 {
            return Err(AppError::Configuration(
                "training.max_features must be at least 1".to_string(),
            ));
        }
        if !(training.test_size > 0.0 && training.test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "training.test_size must be strictly between 0 and 1, got {}",
                training.test_size
            )));
        }
        if !(training.regularization.is_finite() && training.regularization > 0.0) {
            return Err(AppError::Configuration(format!(
                "training.regularization must be positive, got {}",
                training.regularization
            )));
        }
        if training.max_iter == 0 {
            return Err(AppError::Configuration(
                "training.max_iter must be at least 1".to_string(),
            ));
        }

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
    /// Persisted TF-IDF vectorizer
    #[serde(default = "default_vectorizer_path")]
    pub vectorizer_path: PathBuf,

    /// Persisted logistic regression model
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            vectorizer_path: default_vectorizer_path(),
            model_path: default_model_path(),
        }
    }
}

impl ArtifactsConfig {
    /// Same file names under another directory
    pub fn in_dir(&self, dir: &Path) -> Self {
        let file_name = |path: &Path, fallback: &str| {
            dir.join(path.file_name().map(PathBuf::from).unwrap_or_else(|| fallback.into()))
        };
        Self {
            vectorizer_path: file_name(&self.vectorizer_path, "tfidf_vectorizer.json"),
            model_path: file_name(&self.model_path, "model.json"),
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
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_vectorizer_path() -> PathBuf {
    PathBuf::from("artifacts/tfidf_vectorizer.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("artifacts/model.json")
}

fn default_log_level() -> String {
    "info".to_string()
}
