//! LightFlow Control - Effects and light streaming
//!
//! This crate turns analysis output into light frames:
//! - **Effects**: seven built-in audio-reactive effects behind one lifecycle trait
//! - **Host**: activation, failure isolation and auto-deactivation
//! - **Channels**: a shared per-channel color/brightness table
//! - **Streaming**: a fixed-rate dispatcher and HueStream v2 frame encoding
//! - **Engine**: capture → analysis → host wiring on dedicated threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightflow_control::{ChannelTable, EffectConfig, EffectRegistry, LightEngine};
//! use lightflow_core::{AnalysisConfig, SyntheticBackend, SyntheticSignal};
//! use std::sync::Arc;
//!
//! let channels = Arc::new(ChannelTable::new(10));
//! let mut engine = LightEngine::new(
//!     SyntheticBackend::new(SyntheticSignal::default()),
//!     AnalysisConfig::default(),
//!     channels,
//!     EffectRegistry::with_builtin(),
//! )?;
//! engine.activate_effect("Pulse", EffectConfig::default())?;
//! engine.start()?;
//! # Ok::<(), lightflow_control::ControlError>(())
//! ```
//!
//! ## Modules
//!
//! - [`effects`] - Effect trait, built-in effects, registry and host
//! - [`stream`] - Channel table, dispatcher, protocol and sinks
//! - [`engine`] - Audio pipeline wiring
//! - [`events`] - Observable pipeline events
//! - [`metrics`] - Latency and frame-rate counters
//! - [`models`] - Colors and entertainment areas
//! - [`error`] - Error types

#![warn(missing_docs)]

pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod stream;

pub use effects::{
    EffectConfig, EffectContext, EffectFactory, EffectHost, EffectInfo, EffectRegistry,
    EffectState, LightEffect,
};
pub use engine::LightEngine;
pub use error::{ControlError, Result};
pub use events::{EventBus, PipelineEvent};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use models::{EntertainmentArea, LightNode, Rgb};
pub use stream::{
    ChannelState, ChannelTable, FrameSink, HueStreamSink, RecordingSink, StreamConfig,
    StreamDispatcher, TracingSink,
};
