//! Error types for swatch core

use thiserror::Error;

/// Errors raised by the color codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// A channel value outside `0..=255` was supplied
    #[error("channel {channel} out of range: {value} (expected 0..=255)")]
    ChannelOutOfRange { channel: char, value: i64 },

    /// A string that is not of the form `#rrggbb` (lowercase)
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),
}
