//! Polar to Cartesian projection with an optional rigid transform.
//!
//! ```text
//!            y (azimuth 0)
//!            ^
//!            |   / firing
//!            |  /
//!            | / α (clockwise, 1/100 degree)
//!            |/
//!   ---------+---------> x (azimuth 9000)
//!          sensor
//! ```
//!
//! Output units are millimeters. All arithmetic runs in `f64`; coordinates
//! are narrowed to `f32` when the point is stored.

use nalgebra::{Isometry3, Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use std::f64::consts::PI;

use crate::protocol::velodyne::DISTANCE_UNIT_MM;

// =============================================================================
// Rigid Transform
// =============================================================================

/// Fixed rotation plus translation applied as `p' = R·p + t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        RigidTransform {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Take rotation and translation from the top three rows of a
    /// homogeneous matrix. The bottom row is ignored.
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let matrix = matrix.cast::<f64>();
        RigidTransform {
            rotation: matrix.fixed_view::<3, 3>(0, 0).into_owned(),
            translation: matrix.fixed_view::<3, 1>(0, 3).into_owned(),
        }
    }

    /// Build from row-major rows, as found in configuration files
    pub fn from_rows(rows: &[[f32; 4]; 4]) -> Self {
        Self::from_matrix(&Matrix4::from_fn(|r, c| rows[r][c]))
    }

    /// Translation `[x, y, z]` and quaternion `[x, y, z, w]`.
    ///
    /// The quaternion is normalized, so it need not be exactly unit length.
    pub fn from_translation_quaternion(translation: [f32; 3], rotation: [f32; 4]) -> Self {
        let [x, y, z, w] = rotation;
        let q = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        RigidTransform {
            rotation: q.to_rotation_matrix().into_inner().cast::<f64>(),
            translation: Vector3::from(translation).cast::<f64>(),
        }
    }

    pub fn from_isometry(isometry: &Isometry3<f32>) -> Self {
        RigidTransform {
            rotation: isometry.rotation.to_rotation_matrix().into_inner().cast::<f64>(),
            translation: isometry.translation.vector.cast::<f64>(),
        }
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    #[inline]
    pub fn apply(&self, point: Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

// =============================================================================
// Coordinate Projector
// =============================================================================

/// Converts (distance, vertical angle, azimuth) to sensor or world coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateProjector {
    transform: Option<RigidTransform>,
}

impl CoordinateProjector {
    /// Points stay in the sensor frame
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform(transform: Option<RigidTransform>) -> Self {
        CoordinateProjector { transform }
    }

    pub fn transform(&self) -> Option<&RigidTransform> {
        self.transform.as_ref()
    }

    /// Project one return.
    ///
    /// `distance` is in raw 2 mm units, `cos_v`/`sin_v` are the cached
    /// trigonometry of the laser's vertical angle and `azimuth` is the
    /// corrected azimuth in 1/100 degree.
    #[inline]
    pub fn project(&self, distance: u16, cos_v: f64, sin_v: f64, azimuth: f64) -> [f32; 3] {
        let range = distance as f64 * DISTANCE_UNIT_MM;
        let alpha = azimuth * PI / 18000.0;

        let mut p = Vector3::new(
            range * cos_v * alpha.sin(),
            range * cos_v * alpha.cos(),
            range * sin_v,
        );
        if let Some(transform) = &self.transform {
            p = transform.apply(p);
        }

        [p.x as f32, p.y as f32, p.z as f32]
    }
}
