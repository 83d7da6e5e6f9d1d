use crate::error::{AppError, Result};
use crate::ml::classifier::ClassifierState;
use crate::ml::vectorizer::VectorizerState;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Envelope version written by this build
pub const FORMAT_VERSION: u32 = 1;

/// A fitted state that can be persisted inside a versioned envelope
pub trait Artifact: Serialize + DeserializeOwned {
    /// Envelope `kind` tag
    const KIND: &'static str;

    /// Extra checks on a freshly deserialized state
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl Artifact for VectorizerState {
    const KIND: &'static str = "tfidf_vectorizer";
}

impl Artifact for ClassifierState {
    const KIND: &'static str = "logistic_regression";

    fn validate(&self) -> Result<()> {
        ClassifierState::validate(self)
    }
}

/// Envelope fields other than the state itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    #[serde(flatten)]
    metadata: &'a ArtifactMetadata,
    state: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    state: T,
}

/// Serialize a state into its envelope
pub fn to_json<T: Artifact>(state: &T) -> Result<(String, ArtifactMetadata)> {
    let metadata = ArtifactMetadata {
        format_version: FORMAT_VERSION,
        kind: T::KIND.to_string(),
        created_at: Utc::now(),
    };
    let json = serde_json::to_string(&EnvelopeRef {
        metadata: &metadata,
        state,
    })?;
    Ok((json, metadata))
}

/// Read envelope metadata without decoding the state
pub fn metadata_from_json(json: &str) -> Result<ArtifactMetadata> {
    serde_json::from_str(json)
        .map_err(|e| AppError::ArtifactFormat(format!("Unreadable artifact envelope: {}", e)))
}

/// Decode an envelope, rejecting unknown versions and mismatched kinds
pub fn from_json<T: Artifact>(json: &str) -> Result<T> {
    let metadata = metadata_from_json(json)?;

    if metadata.format_version != FORMAT_VERSION {
        return Err(AppError::ArtifactFormat(format!(
            "Unsupported format_version {} (expected {})",
            metadata.format_version, FORMAT_VERSION
        )));
    }
    if metadata.kind != T::KIND {
        return Err(AppError::ArtifactFormat(format!(
            "Expected a '{}' artifact, found '{}'",
            T::KIND,
            metadata.kind
        )));
    }

    let envelope: Envelope<T> = serde_json::from_str(json).map_err(|e| {
        AppError::ArtifactFormat(format!("Invalid {} state: {}", T::KIND, e))
    })?;
    envelope.state.validate()?;

    Ok(envelope.state)
}

/// Write a state to `path`, creating parent directories.
///
/// The file is written next to its destination and renamed into place, so
/// readers never observe a partial artifact.
pub fn save<T: Artifact>(state: &T, path: &Path) -> Result<ArtifactMetadata> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let (json, metadata) = to_json(state)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;

    info!(
        kind = T::KIND,
        path = %path.display(),
        bytes = json.len(),
        "💾 Saved artifact"
    );

    Ok(metadata)
}

/// Load a state from `path`
pub fn load<T: Artifact>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    let state = from_json(&json)?;

    debug!(kind = T::KIND, path = %path.display(), "Loaded artifact");

    Ok(state)
}
