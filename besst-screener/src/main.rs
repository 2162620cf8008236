//! BESST Screener - industry P/E screen over an exchange's listed companies.
//!
//! Prints the response envelope (JSON or markdown) to stdout, or writes it to
//! `--output`. Exits non-zero when the run fails.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use besst_common::config::Config;
use besst_common::config_loader::{check_modular_files, load_modular_config};
use besst_common::logging::{init_logging, init_logging_with_exclusions};
use besst_common::Validate;
use besst_screener::error::ScreenerError;
use besst_screener::run_screening;
use besst_screener::screener::{ReportFormat, ScreenerConfig, ScreeningResponse};

/// Flags sector leaders trading below their industry P/E.
#[derive(Parser, Debug)]
#[command(name = "besst-screener")]
#[command(version)]
#[command(about = "Industry P/E screener for listed companies", long_about = None)]
struct Cli {
    /// Configuration directory (default: ~/.besst)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(short, long, default_value = "json")]
    format: ReportFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_configuration(config_dir: Option<PathBuf>) -> Result<(Config, ScreenerConfig)> {
    let document = load_modular_config(config_dir)?;
    let config = Config::from_document(&document)?;
    config.validate().context("Invalid configuration")?;
    let screener_config = ScreenerConfig::from_document(&document)?;
    Ok((config, screener_config))
}

fn emit(response: &ScreeningResponse, cli: &Cli) -> Result<()> {
    match &cli.output {
        Some(path) => {
            let written = response.save_to_file(path, cli.format)?;
            tracing::info!(path = %written.display(), "Report written");
        }
        None => println!("{}", response.generate(cli.format)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (config, screener_config) = match load_configuration(cli.config_dir.clone()) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_logging("info", "pretty");
            tracing::error!(error = %format!("{:#}", e), "Failed to load configuration");
            let error = ScreenerError::Configuration(format!("{:#}", e));
            emit(&ScreeningResponse::failed(&error), &cli)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("BESST Screener v{}", env!("CARGO_PKG_VERSION"));
    for (file, present) in check_modular_files(cli.config_dir.clone()) {
        tracing::debug!(file = %file, present, "Config file");
    }

    match run_screening(&config, &screener_config).await {
        Ok(report) => {
            tracing::info!(summary = %report.summary(), "Screening finished");
            emit(&ScreeningResponse::completed(&report), &cli)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, "Screening failed");
            emit(&ScreeningResponse::failed(&e), &cli)?;
            Ok(ExitCode::FAILURE)
        }
    }
}
