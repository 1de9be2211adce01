//! Color types and parsing.
//!
//! Colors appear in recipes and style bundles as hex strings (`#RRGGBB`,
//! `#RRGGBBAA`) or a handful of names (`white`, `black`, `transparent`,
//! `light_gray`). [`Rgba`] serializes back to the hex form so style
//! overrides survive a YAML round trip.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(C)]
pub struct Rgba {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0-255, 255 = fully opaque).
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Light gray figure background.
    pub const LIGHT_GRAY: Self = Self::new(240, 240, 240, 255);
    /// Neutral gray for axes and non-significant points.
    pub const GRAY: Self = Self::new(160, 160, 160, 255);

    /// Create a new RGBA color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 255).
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Create a color with modified alpha.
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Convert to array representation.
    #[must_use]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Create from array representation.
    #[must_use]
    pub const fn from_array(arr: [u8; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Linear interpolation between two colors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let inv_t = 1.0 - t;

        Self::new(
            (f32::from(self.r) * inv_t + f32::from(other.r) * t) as u8,
            (f32::from(self.g) * inv_t + f32::from(other.g) * t) as u8,
            (f32::from(self.b) * inv_t + f32::from(other.b) * t) as u8,
            (f32::from(self.a) * inv_t + f32::from(other.a) * t) as u8,
        )
    }

    /// Parse a hex string (`#RGB`, `#RRGGBB`, `#RRGGBBAA`) or a known color name.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            "transparent" | "none" => return Ok(Self::TRANSPARENT),
            "light_gray" | "light_grey" | "lightgray" => return Ok(Self::LIGHT_GRAY),
            "gray" | "grey" => return Ok(Self::GRAY),
            _ => {}
        }

        let hex = trimmed
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidColor(s.to_string()))?;
        if !hex.is_ascii() {
            return Err(Error::InvalidColor(s.to_string()));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::InvalidColor(s.to_string()))
        };
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..=i], 16)
                .map(|v| v * 17)
                .map_err(|_| Error::InvalidColor(s.to_string()))
        };

        match hex.len() {
            3 => Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(Error::InvalidColor(s.to_string())),
        }
    }

    /// Format as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    #[must_use]
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Composite this color over an opaque background, dropping alpha.
    #[must_use]
    pub fn over(self, background: Self) -> Self {
        let a = f32::from(self.a) / 255.0;
        let mix = |fg: u8, bg: u8| (f32::from(fg) * a + f32::from(bg) * (1.0 - a)).round() as u8;
        Self::rgb(
            mix(self.r, background.r),
            mix(self.g, background.g),
            mix(self.b, background.b),
        )
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgba {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Rgba {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_constants() {
        assert_eq!(Rgba::BLACK, Rgba::rgb(0, 0, 0));
        assert_eq!(Rgba::WHITE, Rgba::rgb(255, 255, 255));
        assert_eq!(Rgba::TRANSPARENT.a, 0);
    }

    #[test]
    fn test_rgba_lerp() {
        let mid = Rgba::BLACK.lerp(Rgba::WHITE, 0.5);
        assert_eq!(mid.r, 127);
        assert_eq!(mid.g, 127);
        assert_eq!(mid.b, 127);
    }

    #[test]
    fn test_lerp_boundaries() {
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, -0.5), Rgba::BLACK);
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, 1.5), Rgba::WHITE);
    }

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Rgba::parse("#E64B35").unwrap(), Rgba::rgb(0xE6, 0x4B, 0x35));
        assert_eq!(Rgba::parse("#fff").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::parse("#00000080").unwrap(), Rgba::new(0, 0, 0, 0x80));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Rgba::parse("white").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::parse("transparent").unwrap(), Rgba::TRANSPARENT);
        assert_eq!(Rgba::parse("light_gray").unwrap(), Rgba::LIGHT_GRAY);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Rgba::parse("E64B35").is_err());
        assert!(Rgba::parse("#12345").is_err());
        assert!(Rgba::parse("#GGGGGG").is_err());
        assert!(Rgba::parse("#é12").is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let color = Rgba::new(10, 20, 30, 40);
        assert_eq!(Rgba::parse(&color.to_hex()).unwrap(), color);
        assert_eq!(Rgba::rgb(0x44, 0x77, 0xAA).to_hex(), "#4477AA");
    }

    #[test]
    fn test_over_white() {
        assert_eq!(Rgba::TRANSPARENT.over(Rgba::WHITE), Rgba::WHITE);
        assert_eq!(Rgba::BLACK.over(Rgba::WHITE), Rgba::BLACK);
        let half = Rgba::new(0, 0, 0, 128).over(Rgba::WHITE);
        assert!(half.r > 120 && half.r < 135);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let yaml = serde_yaml_ng::to_string(&Rgba::rgb(255, 0, 0)).unwrap();
        assert!(yaml.contains("#FF0000"));
        let back: Rgba = serde_yaml_ng::from_str("'#00ff00'").unwrap();
        assert_eq!(back, Rgba::rgb(0, 255, 0));
    }
}
