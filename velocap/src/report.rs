//! One-line JSON summaries of captured frames, for `--output`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use velocap_core::{Frame, Point};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSummary {
    pub frame_id: u64,
    /// RFC 3339, microsecond precision
    pub timestamp: String,
    pub points: usize,
    /// Axis-aligned bounds, absent for an empty frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<[f32; 3]>,
}

fn format_timestamp(timestamp_us: u64) -> String {
    match DateTime::<Utc>::from_timestamp_micros(timestamp_us as i64) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => timestamp_us.to_string(),
    }
}

impl FrameSummary {
    pub fn from_frame<P: Point>(frame: &Frame<P>) -> Self {
        let mut bounds: Option<([f32; 3], [f32; 3])> = None;
        for p in frame.points() {
            let xyz = [p.x(), p.y(), p.z()];
            let (min, max) = bounds.get_or_insert((xyz, xyz));
            for axis in 0..3 {
                min[axis] = min[axis].min(xyz[axis]);
                max[axis] = max[axis].max(xyz[axis]);
            }
        }

        FrameSummary {
            frame_id: frame.frame_id(),
            timestamp: format_timestamp(frame.timestamp_us()),
            points: frame.point_count(),
            min: bounds.map(|b| b.0),
            max: bounds.map(|b| b.1),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
