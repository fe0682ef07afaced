//! Sensor wire protocol implementations.
//!
//! This module contains wire format parsing for Velodyne data packets.
//! All functions are pure (no I/O): `&[u8]` in, `Result<T>` out.
//!
//! # Example
//!
//! ```rust,no_run
//! use velocap_core::protocol::velodyne;
//! use velocap_core::Model;
//!
//! let payload: &[u8] = &[0u8; 1206]; // Real payload from network or pcap
//! match velodyne::decode_packet(payload, Model::Vlp16.sensor_type()) {
//!     Ok(packet) => println!("first azimuth {}", packet.blocks[0].rotational_position),
//!     Err(e) => println!("Parse error: {}", e),
//! }
//! ```

pub mod velodyne;

/// Read a little-endian `u16` at a fixed offset.
///
/// Callers validate the buffer length once up front.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Read a little-endian `u32` at a fixed offset.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
