//! Reference key-value service.
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!   client ─────────▶│ net (listener → connection → LineHandler)    │
//!                    │          │                                   │
//!                    │          ▼                                   │
//!                    │ storage (fjall: default, groups, metadata)   │
//!                    │          ▲                 ▲                 │
//!                    │   bus consumers      task queues             │
//!                    │                                              │
//!   operator ───────▶│ http (/health, /metrics)                     │
//!                    └──────────────────────────────────────────────┘
//! ```
//!
//! Loads a TOML config, applies command-line overrides, launches the
//! bootstrap and waits for SIGINT / SIGTERM. A fatal startup error exits 1.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use kv_pipeline::config::loader::{load_config, ConfigError};
use kv_pipeline::config::validation::validate_config;
use kv_pipeline::handler::{HandlerMode, LineHandler};
use kv_pipeline::lifecycle::signals::wait_for_signal;
use kv_pipeline::observability::logging;
use kv_pipeline::{Bootstrap, BootstrapError, PipelineConfig, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "kv-pipeline")]
#[command(about = "Sharded key-value service", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request server port.
    #[arg(long)]
    port: Option<u16>,

    /// Health / metrics endpoint port.
    #[arg(long)]
    http_port: Option<u16>,

    /// Primary storage directory.
    #[arg(long)]
    db_path: Option<String>,

    /// Shard groups, `name:start:count:increment[,...]`.
    #[arg(long)]
    groups: Option<String>,

    /// Target data version in epoch milliseconds.
    #[arg(long)]
    version_timestamp_ms: Option<i64>,

    /// Build a fresh handler for every connection.
    #[arg(long)]
    per_connection: bool,
}

impl Args {
    fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(path) = &self.db_path {
            config.storage.path = path.clone();
        }
        if let Some(groups) = &self.groups {
            config.storage.groups = groups.clone();
        }
        if let Some(ts) = self.version_timestamp_ms {
            config.storage.version_timestamp_ms = ts;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kv-pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "kv-pipeline starting");

    let mode = if args.per_connection {
        HandlerMode::PerConnection
    } else {
        HandlerMode::Singleton
    };
    let service = ServiceConfig::builder(LineHandler::factory())
        .handler_mode(mode)
        .build();

    match run(service, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(service: ServiceConfig, config: PipelineConfig) -> Result<(), BootstrapError> {
    let bootstrap = Bootstrap::launch(service, config).await?;
    wait_for_signal().await;

    let report = bootstrap.shutdown().await;
    for step in report.failures() {
        tracing::warn!(
            step = %step.stage,
            component = %step.component,
            error = step.error.as_deref().unwrap_or_default(),
            "Shutdown step reported an error"
        );
    }
    Ok(())
}
