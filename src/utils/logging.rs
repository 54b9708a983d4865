// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Sets up the logging framework using tracing_subscriber.
/// Filters come from `RUST_LOG`; without it only this crate logs at info and
/// dependencies (reqwest, hyper) are held at warn.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sec13f_extractor=info"));

    fmt()
        .with_env_filter(filter)
        .with_thread_ids(true) // filings run on several worker threads
        .init();

    tracing::debug!("Logging setup complete.");
}
