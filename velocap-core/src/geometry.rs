//! Laser Model Database
//!
//! Vertical angle tables for the supported Velodyne sensors. A [`LaserGeometry`]
//! is built once per capture session and never changes while the session runs,
//! so the per-laser sine and cosine are computed up front.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Sensor type byte for the HDL-32E
pub const SENSOR_TYPE_HDL32E: u8 = 0x21;

/// Sensor type byte for the VLP-16
pub const SENSOR_TYPE_VLP16: u8 = 0x22;

/// VLP-16 vertical angles in degrees, indexed by laser channel
static VERTICAL_ANGLES_VLP16: &[f64] = &[
    -15.0, 1.0, -13.0, 3.0, -11.0, 5.0, -9.0, 7.0, -7.0, 9.0, -5.0, 11.0, -3.0, 13.0, -1.0, 15.0,
];

/// HDL-32E vertical angles in degrees, indexed by laser channel
static VERTICAL_ANGLES_HDL32E: &[f64] = &[
    -30.67, -9.3299999, -29.33, -8.0, -28.0, -6.6700001, -26.67, -5.3299999, -25.33, -4.0, -24.0,
    -2.6700001, -22.67, -1.33, -21.33, 0.0, -20.0, 1.33, -18.67, 2.6700001, -17.33, 4.0, -16.0,
    5.3299999, -14.67, 6.6700001, -13.33, 8.0, -12.0, 9.3299999, -10.67, 10.67,
];

// =============================================================================
// Laser Models
// =============================================================================

/// Supported Velodyne models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// VLP-16 "Puck", 16 lasers
    #[default]
    Vlp16,
    /// HDL-32E, 32 lasers
    Hdl32e,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Vlp16 => "vlp16",
            Model::Hdl32e => "hdl32e",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Vlp16 => "Velodyne VLP-16",
            Model::Hdl32e => "Velodyne HDL-32E",
        }
    }

    /// Parse model from the sensor type byte at the end of a data packet
    pub fn from_byte(sensor_type: u8) -> Option<Self> {
        match sensor_type {
            SENSOR_TYPE_VLP16 => Some(Model::Vlp16),
            SENSOR_TYPE_HDL32E => Some(Model::Hdl32e),
            _ => None,
        }
    }

    /// The sensor type byte this model puts in every data packet
    pub fn sensor_type(&self) -> u8 {
        match self {
            Model::Vlp16 => SENSOR_TYPE_VLP16,
            Model::Hdl32e => SENSOR_TYPE_HDL32E,
        }
    }

    /// Number of physical lasers
    pub fn laser_count(&self) -> usize {
        self.vertical_angles().len()
    }

    /// Vertical angle of each laser channel in degrees
    pub fn vertical_angles(&self) -> &'static [f64] {
        match self {
            Model::Vlp16 => VERTICAL_ANGLES_VLP16,
            Model::Hdl32e => VERTICAL_ANGLES_HDL32E,
        }
    }

    pub fn all() -> &'static [Model] {
        &[Model::Vlp16, Model::Hdl32e]
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u8> for Model {
    type Error = ParseError;

    fn try_from(sensor_type: u8) -> Result<Self, Self::Error> {
        Model::from_byte(sensor_type).ok_or(ParseError::UnknownSensorType(sensor_type))
    }
}

impl FromStr for Model {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "vlp16" => Ok(Model::Vlp16),
            "hdl32e" | "hdl32" => Ok(Model::Hdl32e),
            _ => Err(ParseError::UnknownModel(s.to_string())),
        }
    }
}

// =============================================================================
// Laser Geometry
// =============================================================================

/// Immutable per-model angle table with cached trigonometry
#[derive(Debug, Clone, PartialEq)]
pub struct LaserGeometry {
    model: Model,
    vertical_angles: &'static [f64],
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl LaserGeometry {
    pub fn for_model(model: Model) -> Self {
        let vertical_angles = model.vertical_angles();
        let (cos, sin) = vertical_angles
            .iter()
            .map(|deg| {
                let rad = deg.to_radians();
                (rad.cos(), rad.sin())
            })
            .unzip();

        LaserGeometry {
            model,
            vertical_angles,
            cos,
            sin,
        }
    }

    pub fn vlp16() -> Self {
        Self::for_model(Model::Vlp16)
    }

    pub fn hdl32e() -> Self {
        Self::for_model(Model::Hdl32e)
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Sensor type byte expected in packets for this geometry
    pub fn sensor_type(&self) -> u8 {
        self.model.sensor_type()
    }

    pub fn laser_count(&self) -> usize {
        self.vertical_angles.len()
    }

    /// Laser channel that serves the given return slot
    #[inline]
    pub fn channel(&self, slot: usize) -> usize {
        slot % self.laser_count()
    }

    pub fn vertical_angle(&self, channel: usize) -> f64 {
        self.vertical_angles[channel]
    }

    #[inline]
    pub fn cos(&self, channel: usize) -> f64 {
        self.cos[channel]
    }

    #[inline]
    pub fn sin(&self, channel: usize) -> f64 {
        self.sin[channel]
    }
}

impl From<Model> for LaserGeometry {
    fn from(model: Model) -> Self {
        LaserGeometry::for_model(model)
    }
}
