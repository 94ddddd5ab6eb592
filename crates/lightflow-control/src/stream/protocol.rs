//! HueStream v2 frame encoding
//!
//! Layout:
//! - 16-byte header
//!   - 9 bytes: "HueStream"
//!   - 2 bytes: version 0x02 0x00
//!   - 1 byte:  sequence number
//!   - 2 bytes: reserved
//!   - 1 byte:  color space (0x00 = RGB)
//!   - 1 byte:  reserved
//! - 36-byte entertainment area id (ASCII UUID)
//! - 7 bytes per channel: channel id, then R, G, B as 16-bit big endian

use super::channels::ChannelState;

/// Protocol name at the start of every message
pub const PROTOCOL_NAME: &[u8; 9] = b"HueStream";
/// Header length in bytes
pub const HEADER_LEN: usize = 16;
/// Area id field length in bytes
pub const AREA_ID_LEN: usize = 36;
/// Bytes per channel record
pub const CHANNEL_LEN: usize = 7;

/// Encode one RGB frame.
///
/// Brightness is folded into the 16-bit color components, so a channel at
/// brightness 0.5 sends half-scale values. Area ids that are not 36 bytes are
/// zero-padded or truncated.
pub fn encode_frame(area_id: &str, sequence: u8, channels: &[ChannelState]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(message_len(channels.len()));

    buffer.extend_from_slice(PROTOCOL_NAME);
    buffer.extend_from_slice(&[0x02, 0x00]);
    buffer.push(sequence);
    buffer.extend_from_slice(&[0x00, 0x00]);
    buffer.push(0x00); // RGB
    buffer.push(0x00);

    let area_bytes = area_id.as_bytes();
    let mut area = [0u8; AREA_ID_LEN];
    let copy_len = area_bytes.len().min(AREA_ID_LEN);
    area[..copy_len].copy_from_slice(&area_bytes[..copy_len]);
    buffer.extend_from_slice(&area);

    for (index, state) in channels.iter().enumerate() {
        buffer.push(index as u8);
        let level = state.brightness.clamp(0.0, 1.0);
        for component in [state.color.r, state.color.g, state.color.b] {
            buffer.extend_from_slice(&scale_component(component, level).to_be_bytes());
        }
    }

    buffer
}

/// Total message length for `channels` records
pub fn message_len(channels: usize) -> usize {
    HEADER_LEN + AREA_ID_LEN + channels * CHANNEL_LEN
}

// 255 * 257 == 65535
fn scale_component(component: u8, level: f64) -> u16 {
    ((component as u16 * 257) as f64 * level).round() as u16
}
