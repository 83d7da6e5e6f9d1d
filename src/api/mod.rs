pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::SpamDetector;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<SpamDetector>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(detector: Arc<SpamDetector>) -> Self {
        Self {
            detector,
            started_at: Instant::now(),
        }
    }
}
