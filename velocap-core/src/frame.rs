//! Points and rotation frames.
//!
//! A [`FrameBuilder`] accumulates points on the capture thread. When the
//! rotation closes it is sealed into an immutable [`Frame`] whose ownership
//! moves to the queue and then to the consumer.

use serde::{Deserialize, Serialize};

// =============================================================================
// Point
// =============================================================================

/// Anything that can be built from and read back as three coordinates
pub trait Point: Send + 'static {
    fn from_xyz(x: f32, y: f32, z: f32) -> Self;
    fn x(&self) -> f32;
    fn y(&self) -> f32;
    fn z(&self) -> f32;
}

/// Default point type, millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointXYZ {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PointXYZ {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        PointXYZ { x, y, z }
    }
}

impl Point for PointXYZ {
    #[inline]
    fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        PointXYZ { x, y, z }
    }

    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }

    fn z(&self) -> f32 {
        self.z
    }
}

impl Point for nalgebra::Point3<f32> {
    #[inline]
    fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        nalgebra::Point3::new(x, y, z)
    }

    fn x(&self) -> f32 {
        self.coords.x
    }

    fn y(&self) -> f32 {
        self.coords.y
    }

    fn z(&self) -> f32 {
        self.coords.z
    }
}

impl Point for [f32; 3] {
    #[inline]
    fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        [x, y, z]
    }

    fn x(&self) -> f32 {
        self[0]
    }

    fn y(&self) -> f32 {
        self[1]
    }

    fn z(&self) -> f32 {
        self[2]
    }
}

// =============================================================================
// Frame
// =============================================================================

/// One sealed rotation
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<P = PointXYZ> {
    points: Vec<P>,
    timestamp_us: u64,
    frame_id: u64,
}

impl<P> Frame<P> {
    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Same as [`Frame::len`], frozen at seal time
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Capture time of the packet that closed the rotation, microseconds
    /// since the Unix epoch
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Sequence number within the capture session, starting at 0
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn into_points(self) -> Vec<P> {
        self.points
    }
}

impl<P> IntoIterator for Frame<P> {
    type Item = P;
    type IntoIter = std::vec::IntoIter<P>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, P> IntoIterator for &'a Frame<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

// =============================================================================
// Frame Builder
// =============================================================================

/// Append-only accumulator for the rotation in progress
#[derive(Debug)]
pub struct FrameBuilder<P = PointXYZ> {
    points: Vec<P>,
}

impl<P> FrameBuilder<P> {
    pub fn new() -> Self {
        FrameBuilder { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FrameBuilder {
            points: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, point: P) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Freeze the accumulated points into a frame
    pub fn seal(self, timestamp_us: u64, frame_id: u64) -> Frame<P> {
        Frame {
            points: self.points,
            timestamp_us,
            frame_id,
        }
    }
}

impl<P> Default for FrameBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}
