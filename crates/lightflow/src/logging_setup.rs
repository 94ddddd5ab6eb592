//! Global tracing subscriber for the binary
//!
//! The `[log]` section of the config file picks the level and outputs; `-v`
//! raises the level and `--log-level`/`--log-file`/`--quiet` rewrite the
//! section before it gets here. RUST_LOG still wins over all of them.
//! Console output goes to stderr because `--events-json` owns stdout.

use anyhow::{Context, Result};
use lightflow_core::LogConfig;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Flushes the file writer when dropped; hold it until `main` returns
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Outputs resolved from the config and the verbosity flag
#[derive(Debug, Clone, PartialEq)]
pub struct LogTargets {
    pub level: Level,
    pub console: bool,
    pub file: Option<PathBuf>,
}

impl LogTargets {
    pub fn resolve(config: &LogConfig, verbose: u8) -> Self {
        Self {
            level: raise_level(config.parse_level(), verbose),
            console: config.console_output,
            file: config.file_output.then(|| config.current_log_path()),
        }
    }
}

/// Move `level` one step towards TRACE per `-v`
pub fn raise_level(level: Level, verbose: u8) -> Level {
    let index = LEVELS.iter().position(|l| *l == level).unwrap_or(2);
    LEVELS[(index + verbose as usize).min(LEVELS.len() - 1)]
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn file_layer(config: &LogConfig, path: &Path, level: Level) -> Result<(BoxedLayer, LogGuard)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;
    let file = File::create(path).with_context(|| format!("Failed to create log file {:?}", path))?;
    let (writer, worker) = tracing_appender::non_blocking(file);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(env_filter(level))
        .boxed();
    Ok((layer, LogGuard { _worker: worker }))
}

/// Install the global subscriber
pub fn init(config: &LogConfig, verbose: u8) -> Result<Option<LogGuard>> {
    let targets = LogTargets::resolve(config, verbose);
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if targets.console {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true)
                .with_filter(env_filter(targets.level))
                .boxed(),
        );
    }

    let mut guard = None;
    let mut pruned = Ok(0);
    if let Some(path) = &targets.file {
        // Prune before creating this session's file so it is never counted
        pruned = config.cleanup_old_logs();
        let (layer, worker) = file_layer(config, path, targets.level)?;
        layers.push(layer);
        guard = Some(worker);
    }

    tracing_subscriber::registry().with(layers).init();

    tracing::info!(
        level = %targets.level,
        console = targets.console,
        file = ?targets.file,
        "Logging initialized"
    );
    match pruned {
        Ok(0) => {}
        Ok(n) => tracing::debug!("Removed {} old log files", n),
        Err(e) => tracing::warn!("Failed to remove old log files: {}", e),
    }
    Ok(guard)
}
