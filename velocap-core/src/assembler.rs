//! Per-packet pipeline: decode, correct azimuth, segment, project.
//!
//! ```text
//!   payload ──► decode_packet ──► for each block, for each slot
//!                                   │
//!                                   ├─ AzimuthInterpolator::corrected
//!                                   ├─ RotationSegmenter::observe ──► seal ──► on_frame
//!                                   ├─ skip if no return
//!                                   └─ CoordinateProjector::project ──► FrameBuilder
//! ```
//!
//! The assembler owns the frame in progress. It performs no I/O; sealed
//! frames are handed to a caller supplied closure so the caller decides
//! where they go (a queue, a vector in tests).

use crate::azimuth::AzimuthInterpolator;
use crate::error::ParseError;
use crate::frame::{Frame, FrameBuilder, Point, PointXYZ};
use crate::geometry::LaserGeometry;
use crate::projection::{CoordinateProjector, RigidTransform};
use crate::protocol::velodyne::{decode_packet, LASERS_PER_BLOCK};
use crate::segmenter::RotationSegmenter;

/// What one packet contributed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketSummary {
    /// Points appended across all frames touched by this packet
    pub points: usize,
    /// Frames sealed while processing this packet
    pub frames_sealed: usize,
}

/// Turns a stream of payloads into sealed rotation frames
#[derive(Debug)]
pub struct FrameAssembler<P = PointXYZ> {
    geometry: LaserGeometry,
    projector: CoordinateProjector,
    segmenter: RotationSegmenter,
    current: FrameBuilder<P>,
    next_frame_id: u64,
}

impl<P: Point> FrameAssembler<P> {
    pub fn new(geometry: LaserGeometry, transform: Option<RigidTransform>) -> Self {
        FrameAssembler {
            geometry,
            projector: CoordinateProjector::with_transform(transform),
            segmenter: RotationSegmenter::new(),
            current: FrameBuilder::new(),
            next_frame_id: 0,
        }
    }

    pub fn geometry(&self) -> &LaserGeometry {
        &self.geometry
    }

    /// Decode one payload and feed every return through the pipeline.
    ///
    /// A packet that fails to decode leaves the assembler untouched.
    pub fn process_packet<F>(
        &mut self,
        payload: &[u8],
        timestamp_us: u64,
        mut on_frame: F,
    ) -> Result<PacketSummary, ParseError>
    where
        F: FnMut(Frame<P>),
    {
        let packet = decode_packet(payload, self.geometry.sensor_type())?;
        let interpolator = AzimuthInterpolator::from_packet(&packet);
        let laser_count = self.geometry.laser_count();
        let mut summary = PacketSummary::default();

        for block in packet.blocks.iter() {
            for slot in 0..LASERS_PER_BLOCK {
                let channel = self.geometry.channel(slot);
                let azimuth = interpolator.corrected(block.rotational_position, slot, laser_count);

                if self.segmenter.observe(azimuth) {
                    on_frame(self.seal(timestamp_us));
                    summary.frames_sealed += 1;
                }

                let ret = &block.returns[channel];
                if ret.is_empty() {
                    continue;
                }

                let [x, y, z] = self.projector.project(
                    ret.distance,
                    self.geometry.cos(channel),
                    self.geometry.sin(channel),
                    azimuth,
                );
                self.current.push(P::from_xyz(x, y, z));
                summary.points += 1;
            }
        }

        Ok(summary)
    }

    fn seal(&mut self, timestamp_us: u64) -> Frame<P> {
        // next rotation is usually about as large as this one
        let capacity = self.current.len();
        let builder = std::mem::replace(&mut self.current, FrameBuilder::with_capacity(capacity));
        let frame = builder.seal(timestamp_us, self.next_frame_id);
        self.next_frame_id += 1;
        frame
    }

    /// Points accumulated in the rotation not yet closed
    pub fn pending_points(&self) -> usize {
        self.current.len()
    }

    /// Drop the rotation in progress without sealing it. Returns the number
    /// of points thrown away.
    pub fn discard_partial(&mut self) -> usize {
        let discarded = self.current.len();
        self.current = FrameBuilder::new();
        discarded
    }
}
