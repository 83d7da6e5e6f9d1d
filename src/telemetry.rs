use crate::config::ObservabilityConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

/// Default filter directives when `RUST_LOG` is unset
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!(
        "spam_detector={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig, target: LogTarget) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    match (config.json_logs, target) {
        (true, LogTarget::Stdout) => registry.with(fmt::layer().json()).init(),
        (true, LogTarget::Stderr) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (false, LogTarget::Stdout) => registry.with(fmt::layer()).init(),
        (false, LogTarget::Stderr) => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
