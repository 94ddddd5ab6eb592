//! Shared per-channel output state
//!
//! Effects write, the dispatcher reads once per frame. Writes coalesce: the
//! last value written to a slot before a frame is the one that goes out.

use crate::error::{ControlError, Result};
use crate::models::Rgb;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Color and brightness of one lighting channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelState {
    /// Channel color
    pub color: Rgb,
    /// Requested brightness; the dispatcher clamps it per frame
    pub brightness: f64,
}

#[derive(Debug)]
struct Slots {
    states: Vec<ChannelState>,
    pending: u64,
}

/// Fixed-size table indexed by channel
#[derive(Debug)]
pub struct ChannelTable {
    slots: Mutex<Slots>,
    len: usize,
}

/// What the dispatcher takes out of the table for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// One entry per channel, index order
    pub channels: Vec<ChannelState>,
    /// Writes coalesced into this frame
    pub writes: u64,
}

impl ChannelTable {
    /// Table of `len` dark channels
    pub fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                states: vec![ChannelState::default(); len],
                pending: 0,
            }),
            len,
        }
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-channel table
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set one channel. Non-finite brightness is stored as 0.
    pub fn update_channel(&self, index: usize, color: Rgb, brightness: f64) -> Result<()> {
        if index >= self.len {
            return Err(ControlError::OutOfRange(format!(
                "channel {} outside 0..{}",
                index, self.len
            )));
        }
        let brightness = if brightness.is_finite() { brightness } else { 0.0 };
        let mut slots = self.slots.lock();
        slots.states[index] = ChannelState { color, brightness };
        slots.pending += 1;
        Ok(())
    }

    /// Set every channel under a single lock
    pub fn update_all(&self, color: Rgb, brightness: f64) {
        let brightness = if brightness.is_finite() { brightness } else { 0.0 };
        let mut slots = self.slots.lock();
        for state in slots.states.iter_mut() {
            *state = ChannelState { color, brightness };
        }
        slots.pending += self.len as u64;
    }

    /// Black out every channel
    pub fn clear(&self) {
        self.update_all(Rgb::BLACK, 0.0);
    }

    /// Current state of one channel
    pub fn get(&self, index: usize) -> Option<ChannelState> {
        self.slots.lock().states.get(index).copied()
    }

    /// Copy the table without consuming pending writes
    pub fn snapshot(&self) -> Vec<ChannelState> {
        self.slots.lock().states.clone()
    }

    /// Copy the table and reset the pending-write counter
    pub fn drain(&self) -> FrameSnapshot {
        let mut slots = self.slots.lock();
        let writes = std::mem::take(&mut slots.pending);
        let channels = slots.states.clone();
        drop(slots);
        if writes > 0 {
            trace!("Frame coalesced {} channel writes", writes);
        }
        FrameSnapshot { channels, writes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_out_of_range_rejected() {
        let table = ChannelTable::new(4);
        let err = table.update_channel(4, Rgb::WHITE, 1.0).unwrap_err();
        assert!(matches!(err, ControlError::OutOfRange(_)));
        assert!(table.update_channel(3, Rgb::WHITE, 1.0).is_ok());
    }

    #[test]
    fn test_last_write_wins() {
        let table = ChannelTable::new(2);
        table.update_channel(0, Rgb::new(1, 2, 3), 0.2).unwrap();
        table.update_channel(0, Rgb::new(4, 5, 6), 0.7).unwrap();

        let frame = table.drain();
        assert_eq!(frame.writes, 2);
        assert_eq!(frame.channels[0].color, Rgb::new(4, 5, 6));
        assert_eq!(frame.channels[0].brightness, 0.7);

        // State persists, pending counter resets
        let frame = table.drain();
        assert_eq!(frame.writes, 0);
        assert_eq!(frame.channels[0].brightness, 0.7);
    }

    #[test]
    fn test_nan_brightness_stored_as_zero() {
        let table = ChannelTable::new(1);
        table.update_channel(0, Rgb::WHITE, f64::NAN).unwrap();
        assert_eq!(table.get(0).unwrap().brightness, 0.0);
    }

    #[test]
    fn test_concurrent_writers() {
        let table = Arc::new(ChannelTable::new(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        table
                            .update_channel(i % 8, Rgb::new(t, 0, 0), 0.5)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.drain().writes, 4000);
    }
}
