//! Velodyne data packet parsing (VLP-16, HDL-32E)
//!
//! This module contains pure parsing functions for the 1206 byte UDP payload
//! that Velodyne sensors emit on port 2368. Fields are read one by one at
//! fixed little-endian offsets; nothing relies on struct layout.
//!
//! # Packet layout
//!
//! ```text
//! offset  size  field
//! 0       100   firing block 0
//!               +0  block identifier   u16 (0xEEFF)
//!               +2  rotational pos.    u16 (1/100 degree, 0..35999)
//!               +4  32 × laser return  (u16 distance in 2 mm, u8 intensity)
//! ...           firing blocks 1..11
//! 1200    4     gps timestamp          u32 (microseconds past the hour)
//! 1204    1     return mode            u8
//! 1205    1     sensor type            u8  (0x21 HDL-32E, 0x22 VLP-16)
//! ```
//!
//! Only single return modes are supported; the mode byte is decoded but not
//! interpreted.

use super::{read_u16_le, read_u32_le};
use crate::error::ParseError;

// =============================================================================
// Constants
// =============================================================================

/// Payload size of one data packet
pub const PACKET_SIZE: usize = 1206;

/// Firing blocks per data packet
pub const BLOCKS_PER_PACKET: usize = 12;

/// Laser return slots per firing block
pub const LASERS_PER_BLOCK: usize = 32;

/// Size of one laser return
pub const RETURN_SIZE: usize = 3;

/// Size of one firing block
pub const BLOCK_SIZE: usize = 4 + LASERS_PER_BLOCK * RETURN_SIZE; // 100 bytes

/// Offset of the trailing gps timestamp
pub const GPS_TIMESTAMP_OFFSET: usize = BLOCKS_PER_PACKET * BLOCK_SIZE; // 1200

/// Offset of the return mode byte
pub const MODE_OFFSET: usize = GPS_TIMESTAMP_OFFSET + 4;

/// Offset of the sensor type byte
pub const SENSOR_TYPE_OFFSET: usize = MODE_OFFSET + 1;

/// Block identifier used by single-head sensors
pub const UPPER_BLOCK_ID: u16 = 0xEEFF;

/// Number of rotational position units in a full turn
pub const ROTATION_UNITS: u16 = 36000;

/// Millimeters per raw distance unit
pub const DISTANCE_UNIT_MM: f64 = 2.0;

/// Distances below this (in raw units) are "no return"
pub const DISTANCE_EPSILON: f64 = 0.001;

// =============================================================================
// Packet Structures
// =============================================================================

/// One distance/intensity sample, unconverted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaserReturn {
    /// Distance in 2 mm units
    pub distance: u16,
    /// Calibrated reflectivity, not used by the geometry
    pub intensity: u8,
}

impl LaserReturn {
    /// True if the laser saw nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        (self.distance as f64) < DISTANCE_EPSILON
    }
}

/// 32 returns fired at one rotational position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiringBlock {
    pub block_id: u16,
    /// Azimuth in 1/100 degree
    pub rotational_position: u16,
    pub returns: [LaserReturn; LASERS_PER_BLOCK],
}

/// A decoded data packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataPacket {
    pub blocks: [FiringBlock; BLOCKS_PER_PACKET],
    pub gps_timestamp: u32,
    pub mode: u8,
    pub sensor_type: u8,
}

// =============================================================================
// Parsing Functions
// =============================================================================

/// Decode one data packet payload.
///
/// Fails if the payload is not exactly [`PACKET_SIZE`] bytes, if the sensor
/// type byte is not `expected_sensor`, or if any rotational position is
/// outside 0..36000.
pub fn decode_packet(data: &[u8], expected_sensor: u8) -> Result<DataPacket, ParseError> {
    if data.len() != PACKET_SIZE {
        return Err(ParseError::LengthMismatch {
            expected: PACKET_SIZE,
            actual: data.len(),
        });
    }

    let sensor_type = data[SENSOR_TYPE_OFFSET];
    if sensor_type != expected_sensor {
        return Err(ParseError::SensorMismatch {
            expected: expected_sensor,
            actual: sensor_type,
        });
    }

    let mut packet = DataPacket {
        gps_timestamp: read_u32_le(data, GPS_TIMESTAMP_OFFSET),
        mode: data[MODE_OFFSET],
        sensor_type,
        ..Default::default()
    };

    for (index, block) in packet.blocks.iter_mut().enumerate() {
        *block = parse_block(&data[index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE]);
        if block.rotational_position >= ROTATION_UNITS {
            return Err(ParseError::AzimuthOutOfRange {
                block: index,
                position: block.rotational_position,
            });
        }
    }

    Ok(packet)
}

fn parse_block(data: &[u8]) -> FiringBlock {
    let mut block = FiringBlock {
        block_id: read_u16_le(data, 0),
        rotational_position: read_u16_le(data, 2),
        ..Default::default()
    };

    for (slot, ret) in block.returns.iter_mut().enumerate() {
        let offset = 4 + slot * RETURN_SIZE;
        ret.distance = read_u16_le(data, offset);
        ret.intensity = data[offset + 2];
    }

    block
}

// =============================================================================
// Packet Formatting
// =============================================================================

/// Serialize a data packet into its wire form.
///
/// Sensors never receive data packets; this is used to synthesize captures.
pub fn format_data_packet(packet: &DataPacket) -> [u8; PACKET_SIZE] {
    let mut buf = [0u8; PACKET_SIZE];

    for (index, block) in packet.blocks.iter().enumerate() {
        let base = index * BLOCK_SIZE;
        buf[base..base + 2].copy_from_slice(&block.block_id.to_le_bytes());
        buf[base + 2..base + 4].copy_from_slice(&block.rotational_position.to_le_bytes());
        for (slot, ret) in block.returns.iter().enumerate() {
            let offset = base + 4 + slot * RETURN_SIZE;
            buf[offset..offset + 2].copy_from_slice(&ret.distance.to_le_bytes());
            buf[offset + 2] = ret.intensity;
        }
    }

    buf[GPS_TIMESTAMP_OFFSET..MODE_OFFSET].copy_from_slice(&packet.gps_timestamp.to_le_bytes());
    buf[MODE_OFFSET] = packet.mode;
    buf[SENSOR_TYPE_OFFSET] = packet.sensor_type;
    buf
}
