//! Error types for packet decoding

use thiserror::Error;

/// Errors that can occur when decoding Velodyne data packets
///
/// Every variant is recoverable: the capture loop skips the offending packet
/// and continues with the next one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Payload is not exactly one data packet long
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Sensor type byte doesn't match the configured laser geometry
    #[error("Sensor type mismatch: expected {expected:#04X}, got {actual:#04X}")]
    SensorMismatch { expected: u8, actual: u8 },

    /// Rotational position outside 0..36000
    #[error("Rotational position {position} in block {block} is out of range")]
    AzimuthOutOfRange { block: usize, position: u16 },

    /// Sensor type byte not recognized
    #[error("Unknown sensor type: {0:#04X}")]
    UnknownSensorType(u8),

    /// Unknown or unsupported laser model name
    #[error("Unknown laser model: {0}")]
    UnknownModel(String),
}
