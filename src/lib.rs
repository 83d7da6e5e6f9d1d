//! Spam/ham classification for short text messages.
//!
//! Raw text is normalized ([`nlp`]), turned into TF-IDF features and scored
//! by a class-balanced logistic regression ([`ml`]). The [`api`] module
//! serves a trained [`ml::SpamDetector`] over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod nlp;
pub mod telemetry;

pub use error::{AppError, Result};
