use spam_detector::{
    api::{build_router, AppState},
    config::Config,
    ml::SpamDetector,
    nlp::{Lexicon, TextNormalizer},
    telemetry::{init_tracing, LogTarget},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    init_tracing(&config.observability, LogTarget::Stdout);

    tracing::info!("Starting Spam Detector v{}", env!("CARGO_PKG_VERSION"));

    let lexicon = Lexicon::from_config(&config.lexicon)?;
    tracing::info!(
        stopwords = lexicon.stopword_count(),
        lemmas = lexicon.lemma_count(),
        "✅ Lexicon loaded"
    );

    let detector = SpamDetector::load(
        TextNormalizer::new(lexicon),
        &config.artifacts.vectorizer_path,
        &config.artifacts.model_path,
    )
    .map_err(|e| {
        tracing::error!(
            "Failed to load model artifacts: {}. Run `spam-cli train` first.",
            e
        );
        e
    })?;
    tracing::info!(
        vocabulary_size = detector.vocabulary_size(),
        "✅ Model loaded successfully"
    );

    let state = AppState::new(Arc::new(detector));
    let app = build_router(state).layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP server listening on {}", http_addr);
    tracing::info!("   Predict: POST http://{}/predict", http_addr);
    tracing::info!("   Health:  GET  http://{}/health", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
