//! MirrorSync CLI - Periodic one-way mirror synchronization
//!
//! Runs the synchronization engine against a source and replica directory,
//! either once (`--once`) or periodically at the configured interval until
//! SIGINT or SIGTERM arrives. Passes are never interrupted mid-flight; a
//! shutdown signal takes effect at the next interval boundary.
//!
//! Configuration is layered: YAML file first (`--config` or the platform
//! default path), then command-line overrides on top.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mirrorsync_core::config::LoggingConfig;
use mirrorsync_core::{Config, ConfigBuilder, IEventSink, TracingSink};
use mirrorsync_engine::{PassSummary, SyncEngine};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "mirrorsync",
    version,
    about = "Keep a replica directory an exact mirror of a source directory"
)]
struct Cli {
    /// Source directory (read only)
    source: PathBuf,

    /// Replica directory (created if missing)
    replica: PathBuf,

    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Seconds between passes (overrides the config file)
    #[arg(long)]
    interval: Option<u64>,

    /// Copy tasks per batch (overrides the config file)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Concurrent copies per batch (overrides the config file)
    #[arg(long)]
    max_workers: Option<usize>,

    /// Bytes per fingerprint read (overrides the config file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Log level: trace, debug, info, warn, or error
    #[arg(long)]
    log_level: Option<String>,

    /// Also write log records to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================================
// Configuration layering
// ============================================================================

/// Loads the YAML configuration and layers command-line overrides on top.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(seconds) = cli.interval {
        builder = builder.scheduler_interval_secs(seconds);
    }
    if let Some(n) = cli.batch_size {
        builder = builder.copy_batch_size(n);
    }
    if let Some(n) = cli.max_workers {
        builder = builder.copy_max_workers(n);
    }
    if let Some(bytes) = cli.chunk_size {
        builder = builder.hashing_chunk_size_bytes(bytes);
    }
    if let Some(level) = &cli.log_level {
        builder = builder.logging_level(level.clone());
    }
    if let Some(file) = &cli.log_file {
        builder = builder.logging_file(file.clone());
    }

    builder.build_validated().map_err(|errors| {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("invalid configuration:\n  {}", details.join("\n  "))
    })
}

// ============================================================================
// Tracing setup
// ============================================================================

/// Installs the global subscriber: console always, plus a file layer when
/// `logging.file` is set. `-v` / `-vv` override the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => logging.level_or_default().to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer().with_target(false);

    let file_layer = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create log directory {}", parent.display())
                    })?;
                }
            }
            let file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .init();
    Ok(())
}

// ============================================================================
// Scheduler
// ============================================================================

/// Waits for SIGINT or SIGTERM and cancels the token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
    }

    token.cancel();
}

fn log_summary(summary: &PassSummary) {
    info!(
        dirs_created = summary.dirs_created,
        copied_new = summary.files_copied_new,
        copied_modified = summary.files_copied_modified,
        skipped = summary.files_skipped,
        files_deleted = summary.files_deleted,
        dirs_deleted = summary.dirs_deleted,
        errors = summary.errors.len(),
        duration_ms = summary.duration.as_millis() as u64,
        "pass completed"
    );
}

/// Periodic pass loop. The first tick fires immediately. Per-item failures
/// only show up in the log and the summary; a fatal pass error (missing
/// source root, unwalkable tree) stops the loop and the process.
async fn run_loop(
    engine: &SyncEngine,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    info!(interval_secs, "starting periodic synchronization");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping");
                return Ok(());
            }
        }

        let summary = engine
            .run_pass()
            .await
            .context("synchronization pass failed")?;
        log_summary(&summary);
    }
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_tracing(&config.logging, cli.verbose)?;

    info!(
        source = %cli.source.display(),
        replica = %cli.replica.display(),
        "mirrorsync starting"
    );

    let sink: Arc<dyn IEventSink> = Arc::new(TracingSink::new());
    let engine = SyncEngine::new(&cli.source, &cli.replica, &config, sink);

    if cli.once {
        let summary = engine
            .run_pass()
            .await
            .context("synchronization pass failed")?;
        log_summary(&summary);
        if !summary.is_clean() {
            bail!("{} item(s) failed during the pass; see log", summary.errors.len());
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = run_loop(&engine, config.scheduler.interval_secs, shutdown).await;
    match &result {
        Ok(()) => info!("mirrorsync shut down gracefully"),
        Err(err) => error!(error = %err, "mirrorsync exiting with error"),
    }
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn parses_positional_source_and_replica() {
        let cli = parse(&["mirrorsync", "/data/src", "/data/dst"]);
        assert_eq!(cli.source, PathBuf::from("/data/src"));
        assert_eq!(cli.replica, PathBuf::from("/data/dst"));
        assert!(!cli.once);
    }

    #[test]
    fn missing_replica_argument_is_an_error() {
        assert!(Cli::try_parse_from(["mirrorsync", "/data/src"]).is_err());
    }

    #[test]
    fn flag_overrides_layer_over_defaults() {
        let cli = parse(&[
            "mirrorsync",
            "/s",
            "/r",
            "--interval",
            "5",
            "--batch-size",
            "10",
            "--max-workers",
            "2",
            "--chunk-size",
            "4096",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.scheduler.interval_secs, 5);
        assert_eq!(config.copy.batch_size, 10);
        assert_eq!(config.copy.max_workers, 2);
        assert_eq!(config.hashing.chunk_size_bytes, 4096);
    }

    #[test]
    fn flag_overrides_layer_over_config_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(
            b"hashing:\n  chunk_size_bytes: 1024\ncopy:\n  batch_size: 7\n  max_workers: 3\nscheduler:\n  interval_secs: 60\nlogging:\n  level: warn\n",
        )
        .unwrap();
        tmp.flush().unwrap();

        let path = tmp.path().to_string_lossy().into_owned();
        let cli = parse(&["mirrorsync", "/s", "/r", "--config", &path, "--batch-size", "99"]);
        let config = resolve_config(&cli).unwrap();

        // Flag wins, untouched file values survive.
        assert_eq!(config.copy.batch_size, 99);
        assert_eq!(config.copy.max_workers, 3);
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn invalid_override_fails_resolution() {
        let cli = parse(&["mirrorsync", "/s", "/r", "--batch-size", "0"]);
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.to_string().contains("copy.batch_size"));
    }

    #[test]
    fn invalid_log_level_fails_resolution() {
        let cli = parse(&["mirrorsync", "/s", "/r", "--log-level", "chatty"]);
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let cli = parse(&["mirrorsync", "/s", "/r", "--config", "/no/such/file.yaml"]);
        assert!(resolve_config(&cli).is_err());
    }
}
