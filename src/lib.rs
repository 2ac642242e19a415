pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod scan;
pub mod vision;

pub use config::ScanSageConfig;
pub use error::{BatchError, ConfigError, ScanError};
pub use scan::{BatchResponse, ScanBatch, ScanOrchestrator, ScanRequest};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,scansage_lib=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point of the `scansage` binary
pub async fn run() -> std::process::ExitCode {
    // .env in the working directory, then one level up
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    init_tracing();

    match cli::run(cli::parse()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
