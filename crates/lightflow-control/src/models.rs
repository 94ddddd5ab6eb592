//! Colors and entertainment-area metadata

use crate::error::{ControlError, Result};
use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// Black
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    /// White
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    /// Magenta
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);

    /// Create a color
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert from HSV. `hue` in degrees (wrapped), `saturation`/`value` in `[0, 1]`.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let hue = hue.rem_euclid(360.0) as f32;
        let hsv = Hsv::new(
            hue,
            saturation.clamp(0.0, 1.0) as f32,
            value.clamp(0.0, 1.0) as f32,
        );
        let rgb: Srgb = Srgb::from_color(hsv);
        Self {
            r: to_byte(rgb.red),
            g: to_byte(rgb.green),
            b: to_byte(rgb.blue),
        }
    }

    /// Scale each component by `factor` in `[0, 1]`
    pub fn scaled(self, factor: f64) -> Self {
        let f = factor.clamp(0.0, 1.0);
        Self {
            r: (self.r as f64 * f).round() as u8,
            g: (self.g as f64 * f).round() as u8,
            b: (self.b as f64 * f).round() as u8,
        }
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn to_byte(component: f32) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ControlError;

    /// Parses `#rrggbb` or `rrggbb`
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ControlError::InvalidConfig(format!(
                "'{}' is not a #rrggbb color",
                s
            )));
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| ControlError::InvalidConfig(format!("bad color '{}': {}", s, e)))
        };
        Ok(Self {
            r: component(0..2)?,
            g: component(2..4)?,
            b: component(4..6)?,
        })
    }
}

/// A light channel in an entertainment area.
/// `channel_id` is the streaming index, not the bridge's light id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightNode {
    /// Streaming channel index
    pub channel_id: u8,
    /// Position, roughly `[-1, 1]` per axis
    pub x: f64,
    /// Position, roughly `[-1, 1]` per axis
    pub y: f64,
    /// Position, roughly `[-1, 1]` per axis
    pub z: f64,
}

impl LightNode {
    /// Node without position data
    pub fn new(channel_id: u8) -> Self {
        Self {
            channel_id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// Entertainment area metadata supplied by the device collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentArea {
    /// Area UUID (36 ASCII characters on a Hue bridge)
    pub id: String,
    /// Display name
    pub name: String,
    /// Channels in streaming order
    pub channels: Vec<LightNode>,
}

impl EntertainmentArea {
    /// Area with `count` dense channels `0..count` and no positions
    pub fn with_channel_count(id: impl Into<String>, name: impl Into<String>, count: u8) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channels: (0..count).map(LightNode::new).collect(),
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Check channel ids are exactly `0..N` in order
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(ControlError::InvalidConfig(format!(
                "entertainment area '{}' has no channels",
                self.name
            )));
        }
        for (index, node) in self.channels.iter().enumerate() {
            if node.channel_id as usize != index {
                return Err(ControlError::InvalidConfig(format!(
                    "channel ids must be dense: position {} holds id {}",
                    index, node.channel_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color: Rgb = "#ff8000".parse().unwrap();
        assert_eq!(color, Rgb::new(255, 128, 0));
        assert_eq!(color.to_hex(), "#ff8000");
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(Rgb::from_hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(120.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hsv(240.0, 1.0, 1.0), Rgb::new(0, 0, 255));
        assert_eq!(Rgb::from_hsv(360.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(0.0, 0.0, 1.0), Rgb::WHITE);
    }

    #[test]
    fn test_scaled() {
        assert_eq!(Rgb::new(200, 100, 0).scaled(0.5), Rgb::new(100, 50, 0));
        assert_eq!(Rgb::WHITE.scaled(2.0), Rgb::WHITE);
    }

    #[test]
    fn test_area_validation() {
        let area = EntertainmentArea::with_channel_count("a", "Living room", 4);
        assert!(area.validate().is_ok());
        assert_eq!(area.channel_count(), 4);

        let mut sparse = area.clone();
        sparse.channels[2].channel_id = 7;
        assert!(sparse.validate().is_err());

        let empty = EntertainmentArea::with_channel_count("a", "Empty", 0);
        assert!(empty.validate().is_err());
    }
}
