//! Bounded capture → analysis hand-off

use super::backend::SampleSink;
use super::SampleBlock;
use crate::error::{CoreError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Drop-oldest block queue
///
/// `push` never blocks: when the queue is full the oldest block is evicted
/// and counted, so a stalled consumer loses history instead of stalling the
/// capture thread.
#[derive(Clone)]
pub struct BlockQueue {
    tx: Sender<SampleBlock>,
    rx: Receiver<SampleBlock>,
    dropped: Arc<AtomicU64>,
}

impl BlockQueue {
    /// Create a queue holding at most `capacity` blocks
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "block queue capacity must be positive".to_string(),
            ));
        }
        let (tx, rx) = bounded(capacity);
        Ok(Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Enqueue a block, evicting the oldest when full
    pub fn push(&self, block: SampleBlock) {
        let mut block = block;
        loop {
            match self.tx.try_send(block) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    if self.rx.try_recv().is_ok() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        trace!("Analysis queue full, dropped oldest block ({} total)", total);
                    }
                    block = returned;
                }
                // Both ends live in self, so this cannot happen
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Consumer end
    pub fn receiver(&self) -> Receiver<SampleBlock> {
        self.rx.clone()
    }

    /// Blocks evicted so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Blocks currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// A capture sink that pushes into this queue
    pub fn sink(&self) -> SampleSink {
        let queue = self.clone();
        Arc::new(move |block| queue.push(block))
    }
}
