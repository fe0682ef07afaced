//! Full rotation detection.
//!
//! A rotation is complete when the corrected azimuth goes backwards. The
//! detector looks at every slot, including slots that produce no point, and
//! does not care where packet or block boundaries fall.

/// Stateful wraparound detector for one capture session
#[derive(Debug, Clone, Default)]
pub struct RotationSegmenter {
    last_azimuth: f64,
    rotations: u64,
}

impl RotationSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one corrected azimuth. Returns true if it closes a rotation.
    ///
    /// The azimuth is stored as the last observed value in every case.
    #[inline]
    pub fn observe(&mut self, azimuth: f64) -> bool {
        let boundary = azimuth < self.last_azimuth;
        self.last_azimuth = azimuth;
        if boundary {
            self.rotations += 1;
        }
        boundary
    }

    pub fn last_azimuth(&self) -> f64 {
        self.last_azimuth
    }

    /// Boundaries seen since construction or the last reset
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_boundary_on_wrap() {
        let mut seg = RotationSegmenter::new();
        let mut boundaries = Vec::new();
        for az in (0..36000).chain(0..10) {
            if seg.observe(az as f64) {
                boundaries.push(az);
            }
        }
        assert_eq!(boundaries, vec![0]);
        assert_eq!(seg.rotations(), 1);
    }

    #[test]
    fn test_equal_azimuth_is_not_a_boundary() {
        let mut seg = RotationSegmenter::new();
        assert!(!seg.observe(0.0));
        assert!(!seg.observe(100.0));
        assert!(!seg.observe(100.0));
        assert!(seg.observe(99.5));
    }

    #[test]
    fn test_starts_at_zero() {
        let mut seg = RotationSegmenter::new();
        assert_eq!(seg.last_azimuth(), 0.0);
        // a session starting mid-rotation does not close a frame immediately
        assert!(!seg.observe(18000.0));
        assert_eq!(seg.last_azimuth(), 18000.0);
    }

    #[test]
    fn test_sawtooth_counts_rotations() {
        let mut seg = RotationSegmenter::new();
        let mut count = 0;
        for _ in 0..5 {
            for az in (0..36000).step_by(20) {
                if seg.observe(az as f64) {
                    count += 1;
                }
            }
        }
        // first rotation starts at 0 and is not preceded by a wrap
        assert_eq!(count, 4);
    }

    #[test]
    fn test_reset() {
        let mut seg = RotationSegmenter::new();
        seg.observe(500.0);
        seg.observe(100.0);
        seg.reset();
        assert_eq!(seg.rotations(), 0);
        assert_eq!(seg.last_azimuth(), 0.0);
    }
}
