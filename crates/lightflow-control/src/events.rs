//! Observable pipeline events
//!
//! Publishing never blocks: the bus is bounded and a full bus drops the new
//! event. Nothing in the pipeline depends on an observer being attached.

use crate::effects::EffectState;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use lightflow_core::{BandEnergy, BeatEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Default bus depth
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Status and analysis notifications for presentation layers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Band energies of one analysis frame
    BandEnergy(BandEnergy),
    /// Detected beat
    Beat(BeatEvent),
    /// Active effect replaced or cleared
    ActiveEffectChanged {
        /// New effect name, `None` when nothing is active
        name: Option<String>,
    },
    /// Lifecycle transition of the active effect
    EffectStateChanged {
        /// Effect name
        effect: String,
        /// New state
        state: EffectState,
    },
    /// An effect callback failed; the pipeline keeps running
    EffectError {
        /// Effect name
        effect: String,
        /// Failure description
        message: String,
        /// Consecutive failures including this one
        consecutive: u32,
    },
    /// Dispatcher loop started
    StreamingStarted {
        /// Target frame rate
        target_fps: f64,
        /// Channels per frame
        channels: usize,
    },
    /// Dispatcher loop exited
    StreamingStopped {
        /// Frames sent over the session
        frames: u64,
    },
    /// Sends have been failing persistently
    StreamingError {
        /// Last send error
        message: String,
        /// Consecutive failed frames
        consecutive_failures: u32,
    },
}

/// Bounded fan-in channel for [`PipelineEvent`]
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Sender<PipelineEvent>,
    rx: Receiver<PipelineEvent>,
    dropped: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Bus holding up to `capacity` undelivered events
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish without blocking; drops the event when the bus is full
    pub fn publish(&self, event: PipelineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Event bus full, dropped {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Receiving end. All subscribers share one queue.
    pub fn subscribe(&self) -> Receiver<PipelineEvent> {
        self.rx.clone()
    }

    /// Events dropped because the bus was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_bus_drops_new_events() {
        let bus = EventBus::new(1);
        bus.publish(PipelineEvent::ActiveEffectChanged {
            name: Some("Pulse".to_string()),
        });
        bus.publish(PipelineEvent::ActiveEffectChanged { name: None });
        assert_eq!(bus.dropped(), 1);

        let rx = bus.subscribe();
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::ActiveEffectChanged {
                name: Some("Pulse".to_string())
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_json_shape() {
        let event = PipelineEvent::EffectStateChanged {
            effect: "Chase".to_string(),
            state: EffectState::Running,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "type": "effect_state_changed",
                "effect": "Chase",
                "state": "Running",
            })
        );

        let bands = PipelineEvent::BandEnergy(BandEnergy::new(1.0, 2.0, 3.0, 0.5));
        let value = serde_json::to_value(&bands).unwrap();
        assert_eq!(value["type"], "band_energy");
        assert_eq!(value["total"], 6.0);
    }
}
