//! Frame sinks
//!
//! The dispatcher hands each clamped frame to a [`FrameSink`]. Sinks are
//! synchronous and are expected to return within a fraction of a frame.

use super::channels::ChannelState;
use super::protocol;
use crate::error::{ControlError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Per-channel frame consumer
pub trait FrameSink: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Open the underlying transport
    fn connect(&mut self) -> Result<()>;

    /// Close the transport. Safe to call when not connected.
    fn disconnect(&mut self) -> Result<()>;

    /// Emit one frame, channel index order
    fn send_frame(&mut self, frame: &[ChannelState]) -> Result<()>;
}

/// HueStream v2 over plain UDP
pub struct HueStreamSink {
    target: SocketAddr,
    area_id: String,
    socket: Option<UdpSocket>,
    sequence: u8,
}

impl HueStreamSink {
    /// Sink streaming `area_id` frames to `target`
    pub fn new(target: SocketAddr, area_id: impl Into<String>) -> Self {
        Self {
            target,
            area_id: area_id.into(),
            socket: None,
            sequence: 0,
        }
    }

    /// Whether `connect` succeeded and `disconnect` has not been called
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

impl FrameSink for HueStreamSink {
    fn name(&self) -> &str {
        "huestream"
    }

    fn connect(&mut self) -> Result<()> {
        let bind: SocketAddr = if self.target.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        };
        let socket = UdpSocket::bind(bind)?;
        socket.connect(self.target)?;
        socket.set_nonblocking(true)?;
        info!("HueStream sink connected to {}", self.target);
        self.socket = Some(socket);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            info!("HueStream sink disconnected from {}", self.target);
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: &[ChannelState]) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ControlError::Stream("HueStream sink not connected".to_string()))?;
        let message = protocol::encode_frame(&self.area_id, self.sequence, frame);
        self.sequence = self.sequence.wrapping_add(1);
        let sent = socket.send(&message)?;
        if sent != message.len() {
            return Err(ControlError::Stream(format!(
                "short UDP write: {} of {} bytes",
                sent,
                message.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recording {
    frames: VecDeque<Vec<ChannelState>>,
    connected: bool,
}

/// Keeps the most recent frames in memory.
///
/// Clones share the same recording, so a test can keep one clone and hand the
/// other to a dispatcher.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
    capacity: usize,
    failures: Arc<AtomicU32>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl RecordingSink {
    /// Keep at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording::default())),
            capacity: capacity.max(1),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Recorded frames, oldest first
    pub fn frames(&self) -> Vec<Vec<ChannelState>> {
        self.inner.lock().frames.iter().cloned().collect()
    }

    /// Most recent frame
    pub fn last_frame(&self) -> Option<Vec<ChannelState>> {
        self.inner.lock().frames.back().cloned()
    }

    /// Number of frames currently held
    pub fn frame_count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Whether the sink is between `connect` and `disconnect`
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Make the next `count` sends fail
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

impl FrameSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn connect(&mut self) -> Result<()> {
        self.inner.lock().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.inner.lock().connected = false;
        Ok(())
    }

    fn send_frame(&mut self, frame: &[ChannelState]) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ControlError::Stream("injected send failure".to_string()));
        }

        let mut inner = self.inner.lock();
        if inner.frames.len() >= self.capacity {
            inner.frames.pop_front();
        }
        inner.frames.push_back(frame.to_vec());
        Ok(())
    }
}

/// Logs frames instead of sending them
#[derive(Debug, Default)]
pub struct TracingSink {
    frames: u64,
}

impl TracingSink {
    /// New sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn connect(&mut self) -> Result<()> {
        debug!("Tracing sink connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        debug!("Tracing sink disconnected after {} frames", self.frames);
        Ok(())
    }

    fn send_frame(&mut self, frame: &[ChannelState]) -> Result<()> {
        self.frames += 1;
        let summary: Vec<String> = frame
            .iter()
            .map(|c| format!("{}@{:.2}", c.color, c.brightness))
            .collect();
        trace!(frame = self.frames, "{}", summary.join(" "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rgb;

    fn frame() -> Vec<ChannelState> {
        vec![ChannelState {
            color: Rgb::WHITE,
            brightness: 1.0,
        }]
    }

    #[test]
    fn test_recording_sink_capacity() {
        let mut sink = RecordingSink::new(2);
        let observer = sink.clone();
        sink.connect().unwrap();
        for _ in 0..3 {
            sink.send_frame(&frame()).unwrap();
        }
        assert!(observer.is_connected());
        assert_eq!(observer.frame_count(), 2);
        sink.disconnect().unwrap();
        assert!(!observer.is_connected());
    }

    #[test]
    fn test_recording_sink_injected_failures() {
        let mut sink = RecordingSink::default();
        sink.fail_next(2);
        assert!(sink.send_frame(&frame()).is_err());
        assert!(sink.send_frame(&frame()).is_err());
        assert!(sink.send_frame(&frame()).is_ok());
        assert_eq!(sink.frame_count(), 1);
    }

    #[test]
    fn test_huestream_requires_connect() {
        let mut sink = HueStreamSink::new("127.0.0.1:2100".parse().unwrap(), "area");
        assert!(matches!(
            sink.send_frame(&frame()),
            Err(ControlError::Stream(_))
        ));
    }

    #[test]
    fn test_huestream_sends_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let mut sink = HueStreamSink::new(target, "12345678-1234-1234-1234-123456789abc");
        sink.connect().unwrap();
        sink.send_frame(&frame()).unwrap();
        sink.send_frame(&frame()).unwrap();

        let mut buf = [0u8; 128];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(n, protocol::message_len(1));
        assert_eq!(&buf[..9], b"HueStream");
        assert_eq!(buf[11], 0);
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(n, protocol::message_len(1));
        assert_eq!(buf[11], 1);

        sink.disconnect().unwrap();
        assert!(!sink.is_connected());
    }
}
