pub mod cli;
pub mod config;
pub mod models;
pub mod reference;
pub mod sentinel;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub fn run() -> ExitCode {
    // Initialize tracing; stdout is reserved for the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let reports = match runtime.block_on(cli::execute(&args)) {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!(error = %e, "Audit run failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&reports) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize audit reports");
            ExitCode::FAILURE
        }
    }
}
