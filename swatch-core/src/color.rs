//! Color types and the RGB -> hex codec
//!
//! Palettes are extracted as [`Rgb`] triples and persisted as [`HexColor`]
//! strings. The codec always produces the fixed-width `#rrggbb` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ColorError;

/// An 8-bit-per-channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from untyped integer channels
    ///
    /// Out-of-range channels are rejected, never clamped.
    pub fn from_channels(r: i64, g: i64, b: i64) -> Result<Self, ColorError> {
        Ok(Self {
            r: channel('r', r)?,
            g: channel('g', g)?,
            b: channel('b', b)?,
        })
    }

    /// Packs the channels into a 24-bit value (`0xRRGGBB`)
    pub const fn packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

fn channel(name: char, value: i64) -> Result<u8, ColorError> {
    u8::try_from(value).map_err(|_| ColorError::ChannelOutOfRange {
        channel: name,
        value,
    })
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Converts a color to its canonical `#rrggbb` form
///
/// Leading zero channels are kept: `(0, 0, 5)` encodes as `#000005`.
pub fn to_hex(color: Rgb) -> HexColor {
    HexColor(format!("#{:06x}", color.packed()))
}

/// A lowercase `#rrggbb` color string
///
/// Only constructed through [`to_hex`] or [`HexColor::parse`], so every
/// value matches `^#[0-9a-f]{6}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Parses and validates a hex color string
    pub fn parse(value: &str) -> Result<Self, ColorError> {
        let valid = value
            .strip_prefix('#')
            .is_some_and(|d| {
                d.len() == 6 && d.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'))
            });

        if !valid {
            return Err(ColorError::InvalidHex(value.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    /// Decodes the color back into its channels
    pub fn to_rgb(&self) -> Rgb {
        let packed = u32::from_str_radix(&self.0[1..], 16).unwrap_or_default();
        Rgb::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl From<Rgb> for HexColor {
    fn from(color: Rgb) -> Self {
        to_hex(color)
    }
}
