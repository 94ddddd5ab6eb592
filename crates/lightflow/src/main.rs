//! LightFlow - Audio-reactive light streaming
//!
//! Captures audio, runs the analysis chain, drives one effect and streams the
//! resulting frames until Ctrl-C.

mod config;
mod logging_setup;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{AppConfig, SinkConfig};
use crossbeam_channel::{bounded, select, Receiver};
use lightflow_control::{
    ChannelTable, EffectRegistry, EventBus, FrameSink, HueStreamSink, LightEngine,
    PipelineEvent, StreamDispatcher, TracingSink,
};
use lightflow_core::{AudioBackend, AudioDevice, SyntheticBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lightflow", version, about = "Audio-reactive light streaming")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Effect to activate
    #[arg(short, long)]
    effect: Option<String>,

    /// Streaming frame rate
    #[arg(long)]
    fps: Option<f64>,

    /// Channels in the entertainment area
    #[arg(long)]
    channels: Option<usize>,

    /// Audio device id or name substring
    #[arg(short, long)]
    device: Option<String>,

    /// Use the synthetic signal instead of audio hardware
    #[arg(long)]
    synthetic: bool,

    /// Print audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print available effects and exit
    #[arg(long)]
    list_effects: bool,

    /// Print pipeline events to stdout as JSON lines
    #[arg(long)]
    events_json: bool,

    /// Seconds between metrics log lines, 0 to disable
    #[arg(long, default_value_t = 10)]
    metrics_interval: u64,

    /// Log level, replacing [log] level
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Raise the log level one step per occurrence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write a timestamped log file under [log] log_dir
    #[arg(long)]
    log_file: bool,

    /// No log output on stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(effect) = &self.effect {
            config.effect.name = effect.clone();
        }
        if let Some(fps) = self.fps {
            config.stream.target_fps = fps;
        }
        if let Some(channels) = self.channels {
            config.stream.channel_count = channels;
        }
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if self.synthetic {
            config.audio.synthetic = true;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.log_file {
            config.log.file_output = true;
        }
        if self.quiet {
            config.log.console_output = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let _log_guard = logging_setup::init(&config.log, cli.verbose)?;
    info!("LightFlow {} starting", env!("CARGO_PKG_VERSION"));

    if cli.list_effects {
        for effect in EffectRegistry::with_builtin().available() {
            println!("{:<18} {}", effect.name, effect.description);
        }
        return Ok(());
    }

    #[cfg(feature = "audio")]
    if !config.audio.synthetic {
        let backend = lightflow_core::CpalBackend::new();
        match backend.enumerate() {
            Ok(devices) if !devices.is_empty() => return run(backend, &config, &cli).await,
            Ok(_) => warn!("No audio devices found, falling back to synthetic signal"),
            Err(e) => warn!("Audio backend unavailable ({}), falling back to synthetic signal", e),
        }
    }

    let backend = SyntheticBackend::new(config.audio.signal);
    run(backend, &config, &cli).await
}

async fn run<B: AudioBackend>(backend: B, config: &AppConfig, cli: &Cli) -> Result<()> {
    let channels = Arc::new(ChannelTable::new(config.stream.channel_count));
    let events = EventBus::default();
    let mut engine = LightEngine::new(
        backend,
        config.analysis.clone(),
        channels.clone(),
        EffectRegistry::with_builtin(),
    )?
    .with_events(events.clone());

    if cli.list_devices {
        for device in engine.enumerate_devices()? {
            println!("{}  [{}]", device, device.id);
        }
        return Ok(());
    }

    if let Some(wanted) = &config.audio.device {
        let devices = engine.enumerate_devices()?;
        let device = find_device(&devices, wanted)
            .with_context(|| format!("No audio device matches '{}'", wanted))?;
        engine.source_mut().select(device)?;
    }

    engine.activate_effect(&config.effect.name, config.effect.params.clone())?;
    engine.start()?;

    let mut dispatcher = StreamDispatcher::new(config.stream.clone(), channels)?
        .with_events(events.clone())
        .with_metrics(engine.metrics().clone());
    dispatcher.start(build_sink(&config.sink))?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    let printer = {
        let rx = events.subscribe();
        let json = cli.events_json;
        thread::Builder::new()
            .name("lightflow-events".to_string())
            .spawn(move || drain_events(rx, stop_rx, json))?
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(cli.metrics_interval.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
            _ = ticker.tick(), if cli.metrics_interval > 0 => {
                let m = engine.metrics().snapshot();
                info!(
                    "fps {:.1} | analysis {:.2} ms | dispatch {:.3} ms | frames {} | beats {} | dropped blocks {}",
                    m.streaming_fps,
                    m.analysis_latency_ms,
                    m.dispatch_latency_ms,
                    m.frames_sent,
                    m.beats,
                    engine.dropped_blocks()
                );
            }
        }
    }

    dispatcher.stop().await?;
    engine.shutdown();
    drop(stop_tx);
    if printer.join().is_err() {
        bail!("event printer panicked");
    }
    Ok(())
}

fn find_device(devices: &[AudioDevice], wanted: &str) -> Option<AudioDevice> {
    let needle = wanted.to_lowercase();
    devices
        .iter()
        .find(|d| d.id == wanted)
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.name.to_lowercase().contains(&needle))
        })
        .cloned()
}

fn build_sink(config: &SinkConfig) -> Box<dyn FrameSink> {
    match config {
        SinkConfig::Log => Box::new(TracingSink::new()),
        SinkConfig::HueStream { target, area_id } => {
            Box::new(HueStreamSink::new(*target, area_id.clone()))
        }
    }
}

fn drain_events(rx: Receiver<PipelineEvent>, stop: Receiver<()>, json: bool) {
    loop {
        select! {
            recv(rx) -> event => match event {
                Ok(event) => print_event(&event, json),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

fn print_event(event: &PipelineEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }
    match event {
        PipelineEvent::BandEnergy(_) => {}
        PipelineEvent::Beat(beat) => tracing::debug!("Beat: {:.1} bpm", beat.bpm),
        PipelineEvent::EffectError { effect, message, .. } => {
            warn!("Effect '{}' error: {}", effect, message)
        }
        PipelineEvent::StreamingError {
            message,
            consecutive_failures,
        } => warn!(
            "Streaming failing ({} frames): {}",
            consecutive_failures, message
        ),
        other => info!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightflow_core::AudioDeviceKind;

    fn device(id: &str, name: &str) -> AudioDevice {
        AudioDevice {
            id: id.to_string(),
            name: name.to_string(),
            kind: AudioDeviceKind::Input,
            is_default: false,
        }
    }

    #[test]
    fn test_find_device_by_id_then_name() {
        let devices = vec![device("in:0", "USB Microphone"), device("out:1", "Speakers")];
        assert_eq!(find_device(&devices, "out:1").unwrap().name, "Speakers");
        assert_eq!(find_device(&devices, "usb").unwrap().id, "in:0");
        assert!(find_device(&devices, "hdmi").is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["lightflow", "--effect", "Strobe", "--fps", "40", "--synthetic"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.effect.name, "Strobe");
        assert_eq!(config.stream.target_fps, 40.0);
        assert!(config.audio.synthetic);
        assert_eq!(config.stream.channel_count, 10);
        assert_eq!(config.log, lightflow_core::LogConfig::default());
    }

    #[test]
    fn test_cli_logging_flags() {
        let cli = Cli::parse_from(["lightflow", "--log-level", "warn", "-vv", "--log-file", "-q"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(cli.verbose, 2);
        assert_eq!(config.log.level, "warn");
        assert!(config.log.file_output);
        assert!(!config.log.console_output);

        let targets = logging_setup::LogTargets::resolve(&config.log, cli.verbose);
        assert_eq!(targets.level, tracing::Level::DEBUG);
        assert!(!targets.console);
        assert!(targets.file.is_some());
    }

    #[test]
    fn test_cli_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["lightflow", "--log-level", "loud"]).is_err());
    }
}
