use crate::error::{AppError, Result};
use crate::ml::models::Label;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Column layout of a labelled corpus file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusFormat {
    /// `Category`, `Message` columns
    Email,
    /// `v1` (label), `v2` (text) columns, extra trailing columns allowed
    Sms,
}

impl CorpusFormat {
    pub fn label_column(&self) -> &'static str {
        match self {
            CorpusFormat::Email => "Category",
            CorpusFormat::Sms => "v1",
        }
    }

    pub fn text_column(&self) -> &'static str {
        match self {
            CorpusFormat::Email => "Message",
            CorpusFormat::Sms => "v2",
        }
    }
}

impl FromStr for CorpusFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(CorpusFormat::Email),
            "sms" => Ok(CorpusFormat::Sms),
            other => Err(AppError::Configuration(format!(
                "Unknown corpus format '{}' (expected 'email' or 'sms')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CorpusFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorpusFormat::Email => write!(f, "email"),
            CorpusFormat::Sms => write!(f, "sms"),
        }
    }
}

/// One corpus file to train on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub format: CorpusFormat,
}

/// Parses the CLI form `PATH:FORMAT`
impl FromStr for DatasetConfig {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let (path, format) = s.rsplit_once(':').ok_or_else(|| {
            AppError::Configuration(format!(
                "Dataset '{}' must be given as PATH:FORMAT (format is 'email' or 'sms')",
                s
            ))
        })?;
        if path.is_empty() {
            return Err(AppError::Configuration(format!(
                "Dataset '{}' has an empty path",
                s
            )));
        }

        Ok(Self {
            path: PathBuf::from(path),
            format: format.parse()?,
        })
    }
}

/// A raw message with its class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledMessage {
    pub text: String,
    pub label: Label,
}

impl LabeledMessage {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Count (ham, spam) messages
pub fn class_counts(messages: &[LabeledMessage]) -> (usize, usize) {
    let spam = messages.iter().filter(|m| m.label == Label::Spam).count();
    (messages.len() - spam, spam)
}

/// Decode file bytes as UTF-8, falling back to Latin-1
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

fn parse_label(raw: &str) -> Label {
    if raw.trim().eq_ignore_ascii_case("spam") {
        Label::Spam
    } else {
        Label::Ham
    }
}

/// Parse CSV text in the given layout.
///
/// Records too short to hold both columns are skipped.
pub fn parse_csv(text: &str, format: CorpusFormat) -> Result<Vec<LabeledMessage>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "{} corpus is missing the '{}' column",
                    format, name
                ))
            })
    };
    let label_idx = column(format.label_column())?;
    let text_idx = column(format.text_column())?;

    let mut messages = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(label), Some(text)) = (record.get(label_idx), record.get(text_idx)) {
            messages.push(LabeledMessage::new(text, parse_label(label)));
        }
    }

    Ok(messages)
}

/// Load one corpus file
pub fn load_csv(path: &Path, format: CorpusFormat) -> Result<Vec<LabeledMessage>> {
    let bytes = std::fs::read(path)?;
    let messages = parse_csv(&decode_text(bytes), format)?;

    let (ham, spam) = class_counts(&messages);
    info!(
        path = %path.display(),
        records = messages.len(),
        spam,
        ham,
        "Loaded corpus"
    );

    Ok(messages)
}

/// Load and concatenate every configured corpus, skipping files that fail
pub fn load_corpora(datasets: &[DatasetConfig]) -> Result<Vec<LabeledMessage>> {
    let mut messages = Vec::new();

    for dataset in datasets {
        match load_csv(&dataset.path, dataset.format) {
            Ok(loaded) => messages.extend(loaded),
            Err(e) => {
                warn!(
                    path = %dataset.path.display(),
                    format = %dataset.format,
                    error = %e,
                    "Skipping corpus"
                );
            }
        }
    }

    if messages.is_empty() {
        return Err(AppError::Training(
            "No messages could be loaded from the configured datasets".to_string(),
        ));
    }

    Ok(messages)
}

/// Train/test partition as sorted positions into the source data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded split that keeps each class's proportion in both partitions.
///
/// Each class contributes `round(n_c · test_size)` examples to the test set,
/// at least one when it has two or more members and never all of them.
pub fn stratified_split(labels: &[Label], test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Configuration(format!(
            "test_size must be strictly between 0 and 1, got {}",
            test_size
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in Label::all() {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        if members.is_empty() {
            continue;
        }

        members.shuffle(&mut rng);
        let n = members.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
        };

        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(Split { train, test })
}
