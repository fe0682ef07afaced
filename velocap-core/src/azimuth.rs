//! Azimuth correction for the second firing of a block.
//!
//! A VLP-16 fires its 16 lasers twice per block, so return slots 16..32 were
//! taken roughly half way to the next block. Their azimuth is approximated by
//! adding half the gap between the first two blocks of the packet. The
//! HDL-32E uses all 32 slots for distinct lasers and never needs the step.

use crate::protocol::velodyne::{DataPacket, ROTATION_UNITS};

const FULL_TURN: f64 = ROTATION_UNITS as f64;

/// Half the forward angular gap between two consecutive firing blocks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AzimuthInterpolator {
    step: f64,
}

impl AzimuthInterpolator {
    /// Build from the rotational positions of block 0 and block 1
    pub fn from_positions(first: u16, second: u16) -> Self {
        let gap = if second < first {
            second as f64 + FULL_TURN - first as f64
        } else {
            (second - first) as f64
        };

        AzimuthInterpolator { step: gap / 2.0 }
    }

    /// The same step is reused for every block in the packet
    pub fn from_packet(packet: &DataPacket) -> Self {
        Self::from_positions(
            packet.blocks[0].rotational_position,
            packet.blocks[1].rotational_position,
        )
    }

    /// Interpolation step in 1/100 degree
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Effective azimuth of return `slot` in a block at `raw` position.
    ///
    /// Slots below `laser_count` fire at the raw position. The result is
    /// always within [0, 36000).
    #[inline]
    pub fn corrected(&self, raw: u16, slot: usize, laser_count: usize) -> f64 {
        let azimuth = raw as f64;
        if slot < laser_count {
            return azimuth;
        }

        let shifted = azimuth + self.step;
        if shifted >= FULL_TURN {
            shifted - FULL_TURN
        } else {
            shifted
        }
    }
}
