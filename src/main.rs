//! Label transfer binary

use clap::Parser;
use es2loki_labels::{Config, LabelTransfer, run_transfer};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize tracing
    initialize_tracing(&config.log_level);

    info!("Starting es2loki label transfer v{}", env!("CARGO_PKG_VERSION"));

    run_transfer(&LabelTransfer, &config).await
}

/// Initialize structured logging on stderr, keeping stdout for records
fn initialize_tracing(log_level: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
