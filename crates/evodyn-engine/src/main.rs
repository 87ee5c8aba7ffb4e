//! Batch runner binary for evodyn.
//!
//! Loads an experiment configuration, runs its duplicate simulations in
//! parallel, and prints one JSON line per finished run to stdout. Logs go
//! to stderr so the output can be piped straight into other tools.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$EVODYN_CONFIG` or `evodyn-config.yaml`
//! 2. Initialize structured logging (`RUST_LOG` overrides the config level)
//! 3. Run the batch
//! 4. Log the summary and fail if any run failed

mod batch;
mod error;

use std::io::Write;
use std::path::PathBuf;

use evodyn_core::ExperimentConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "EVODYN_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset.
const DEFAULT_CONFIG_PATH: &str = "evodyn-config.yaml";

/// Application entry point for the batch runner.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, output fails, or any
/// run of the batch failed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!(
        source = source,
        experiment = config.experiment.name,
        duplicates = config.experiment.duplicates,
        effective_zero = config.dynamics.effective_zero,
        background_rate = config.dynamics.background_rate,
        seed = ?config.dynamics.seed,
        "Configuration loaded"
    );

    // 3. Run the batch.
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let summary = batch::run_batch(&config, &mut out).await?;
    out.flush().map_err(EngineError::from)?;

    // 4. Report.
    if summary.failed > 0 {
        return Err(EngineError::RunsFailed {
            failed: summary.failed,
            total: summary.total,
        }
        .into());
    }

    info!("evodyn-engine finished");
    Ok(())
}

/// Load the experiment configuration.
///
/// An explicit `$EVODYN_CONFIG` must exist. The default path is optional;
/// defaults are used when it is absent.
fn load_config() -> Result<(ExperimentConfig, String), EngineError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        let config = ExperimentConfig::from_file(&path)?;
        return Ok((config, path.display().to_string()));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = ExperimentConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        Ok((ExperimentConfig::default(), "defaults".to_owned()))
    }
}
