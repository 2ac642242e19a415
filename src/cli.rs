use crate::ai::{GeminiClient, HttpClassifier};
use crate::config::ScanSageConfig;
use crate::error::{BatchError, ConfigError, ScanError};
use crate::scan::{Organ, ScanBatch, ScanOrchestrator, ScanRequest};
use crate::vision::RegionExtraction;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "scansage", version, about = "Medical scan analysis driver")]
pub struct Cli {
    #[arg(long, global = true, help = "Print compact instead of pretty JSON")]
    pub compact: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a batch of scans and answer an optional question
    Chat {
        #[arg(long, short)]
        message: Option<String>,
        files: Vec<PathBuf>,
    },
    /// Structured report for one scan
    Analyze {
        file: PathBuf,
        #[arg(long, short)]
        message: Option<String>,
    },
    /// Write heatmap.png and roi.png for one scan
    Heatmap {
        file: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Classify one scan with an explicit organ model
    Predict { organ: Organ, file: PathBuf },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse the process arguments
pub fn parse() -> Cli {
    Cli::parse()
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ScanSageConfig::from_env()?;

    match cli.command {
        Commands::Chat { message, files } => {
            config.require_api_key()?;
            let orchestrator = build_orchestrator(&config)?;

            let mut images = Vec::with_capacity(files.len());
            for path in &files {
                images.push(read_request(path).await?);
            }
            let mut batch = ScanBatch::new(images);
            if let Some(message) = message {
                batch = batch.with_message(message);
            }

            let response = orchestrator.process_batch(batch).await?;
            print_json(&response, cli.compact)
        }
        Commands::Analyze { file, message } => {
            config.require_api_key()?;
            let orchestrator = build_orchestrator(&config)?;
            let request = read_request(&file).await?;
            let analysis = orchestrator.analyze(&request, message.as_deref()).await?;
            print_json(&analysis, cli.compact)
        }
        Commands::Heatmap { file, out_dir } => {
            let orchestrator = build_orchestrator(&config)?;
            let request = read_request(&file).await?;
            let regions = orchestrator.extract_regions(request.data).await?;
            let written = write_regions(&regions, &out_dir).await?;
            print_json(&written, cli.compact)
        }
        Commands::Predict { organ, file } => {
            let orchestrator = build_orchestrator(&config)?;
            let request = read_request(&file).await?;
            let prediction = orchestrator.predict(&request.data, organ).await?;
            print_json(&prediction, cli.compact)
        }
    }
}

fn build_orchestrator(config: &ScanSageConfig) -> Result<ScanOrchestrator, CliError> {
    let analyst = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let classifier = Arc::new(HttpClassifier::new(config.classifier.clone())?);
    Ok(ScanOrchestrator::new(config, analyst, classifier))
}

/// Read a scan from disk. Zero-byte files become empty requests.
pub async fn read_request(path: &Path) -> Result<ScanRequest, CliError> {
    let data = tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ScanRequest::new(filename, data))
}

/// Files produced by the heatmap command
#[derive(Debug, Serialize)]
pub struct WrittenRegions {
    pub heatmap: PathBuf,
    pub roi: Option<PathBuf>,
    pub message: String,
}

pub async fn write_regions(regions: &RegionExtraction, out_dir: &Path) -> Result<WrittenRegions, CliError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| CliError::Io { path, source }
    };

    tokio::fs::create_dir_all(out_dir).await.map_err(io_err(out_dir))?;

    let heatmap = out_dir.join("heatmap.png");
    tokio::fs::write(&heatmap, regions.heatmap.as_bytes())
        .await
        .map_err(io_err(&heatmap))?;

    let roi = match &regions.roi {
        Some(image) => {
            let path = out_dir.join("roi.png");
            tokio::fs::write(&path, image.as_bytes())
                .await
                .map_err(io_err(&path))?;
            Some(path)
        }
        None => None,
    };

    Ok(WrittenRegions {
        heatmap,
        roi,
        message: regions.summary(),
    })
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), CliError> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}
