//! Zappy CLI - Watch a directory and upload new files to Cloud Storage
//!
//! Settings come from `settings.toml` (created with defaults on first run)
//! and can be overridden per run with flags. The process runs until
//! interrupted with Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use zappy_core::config::{Config, ConfigOverrides};

mod orchestrator;
mod output;

use orchestrator::{export_credentials, gcs_store_factory, Orchestrator};
use output::{ConsoleObserver, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "zappy",
    version,
    about = "Watch a directory and upload new files to a Cloud Storage bucket"
)]
pub struct Cli {
    /// Directory to watch
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Destination bucket
    #[arg(long)]
    bucket: Option<String>,

    /// GCP project ID
    #[arg(long)]
    project: Option<String>,

    /// Path to the credentials JSON file
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Storage provider
    #[arg(long)]
    provider: Option<String>,

    /// Upload files already in the directory but missing from the bucket
    #[arg(long)]
    upload_missing: bool,

    /// Report what would be uploaded without uploading
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Use alternate settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Number of files uploaded at once
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=64))]
    max_concurrent: Option<u32>,

    /// Wait until a new file's size is stable for this many milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            directory: self.directory.clone(),
            provider: self.provider.clone(),
            project: self.project.clone(),
            bucket: self.bucket.clone(),
            credentials: self.credentials.clone(),
            max_concurrent_uploads: self.max_concurrent,
            settle_delay_ms: self.settle_ms,
            dry_run: self.dry_run,
            upload_missing: self.upload_missing,
        }
    }

    /// Filter used when `RUST_LOG` is unset
    fn default_filter(&self, config_level: Option<&str>) -> String {
        match self.verbose {
            0 => config_level.unwrap_or("info").to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

/// Cancels `token` on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Logging comes up before the settings are validated, so only the
    // level is taken from the file here.
    let config_level = Config::load(&config_path).ok().map(|c| c.logging.level);
    let filter = cli.default_filter(config_level.as_deref());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(config = %config_path.display(), "Starting zappy");

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let shutdown = CancellationToken::new();
    let mut orchestrator = Orchestrator::new(
        Arc::new(ConsoleObserver::new(format)),
        gcs_store_factory(),
        shutdown.clone(),
    );

    let Ok(resolved) = orchestrator.validate(&config_path, &cli.overrides()) else {
        return ExitCode::FAILURE;
    };
    // Still single-threaded here, so changing the environment is safe.
    export_credentials(&resolved);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        tokio::spawn(shutdown_signal(shutdown));
        orchestrator.serve(resolved).await
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
