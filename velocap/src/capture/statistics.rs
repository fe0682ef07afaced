use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the capture thread, readable from any thread
#[derive(Debug, Default)]
pub struct Statistics {
    packets_received: AtomicU64,
    length_mismatches: AtomicU64,
    sensor_mismatches: AtomicU64,
    azimuth_errors: AtomicU64,
    frames_sealed: AtomicU64,
    points_emitted: AtomicU64,
}

/// Point-in-time copy of [`Statistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub packets_received: u64,
    pub length_mismatches: u64,
    pub sensor_mismatches: u64,
    pub azimuth_errors: u64,
    pub frames_sealed: u64,
    pub points_emitted: u64,
}

impl StatisticsSnapshot {
    /// Packets that were skipped for any reason
    pub fn packets_skipped(&self) -> u64 {
        self.length_mismatches + self.sensor_mismatches + self.azimuth_errors
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn length_mismatch(&self) {
        self.length_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the running count, for rate limited logging
    pub(crate) fn sensor_mismatch(&self) -> u64 {
        self.sensor_mismatches.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn azimuth_error(&self) {
        self.azimuth_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn points(&self, count: usize) {
        self.points_emitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn full_rotation(&self, key: &str, frame_id: u64, points: usize) {
        let total = self.frames_sealed.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "{}: Full rotation #{} (frame {}), {} points, {} packets received, {} skipped",
            key,
            total,
            frame_id,
            points,
            self.packets_received.load(Ordering::Relaxed),
            self.length_mismatches.load(Ordering::Relaxed)
                + self.sensor_mismatches.load(Ordering::Relaxed)
                + self.azimuth_errors.load(Ordering::Relaxed)
        );
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            length_mismatches: self.length_mismatches.load(Ordering::Relaxed),
            sensor_mismatches: self.sensor_mismatches.load(Ordering::Relaxed),
            azimuth_errors: self.azimuth_errors.load(Ordering::Relaxed),
            frames_sealed: self.frames_sealed.load(Ordering::Relaxed),
            points_emitted: self.points_emitted.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.packets_received,
            &self.length_mismatches,
            &self.sensor_mismatches,
            &self.azimuth_errors,
            &self.frames_sealed,
            &self.points_emitted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
