use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::topology::NUM_SENSORS;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub angular_velocity: Vector3<f64>,
    pub linear_acceleration: Vector3<f64>,
}

/// Composite message of one fingertip: every proximity and force reading,
/// indexed by global sensor index, plus the front-board IMU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingertipSensorSample {
    pub proximity: [u16; NUM_SENSORS],
    pub force: [u16; NUM_SENSORS],
    pub imu: ImuSample,
}

impl Default for FingertipSensorSample {
    fn default() -> Self {
        Self {
            proximity: [0; NUM_SENSORS],
            force: [0; NUM_SENSORS],
            imu: ImuSample::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityDistance {
    pub frame_id: String,
    pub distance_m: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointFieldType {
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointField {
    pub name: &'static str,
    pub offset: u32,
    pub datatype: PointFieldType,
}

/// Packed x/y/z float layout of every proximity cloud.
pub const XYZ_FIELDS: [PointField; 3] = [
    PointField {
        name: "x",
        offset: 0,
        datatype: PointFieldType::Float32,
    },
    PointField {
        name: "y",
        offset: 4,
        datatype: PointFieldType::Float32,
    },
    PointField {
        name: "z",
        offset: 8,
        datatype: PointFieldType::Float32,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityCloud {
    pub frame_id: String,
    pub fields: [PointField; 3],
    pub points: Vec<Vector3<f32>>,
}

impl ProximityCloud {
    /// Cloud holding the single point seen by a proximity sensor, on the
    /// sensor's z axis.
    pub fn single_point(frame_id: String, distance_m: f32) -> Self {
        Self {
            frame_id,
            fields: XYZ_FIELDS,
            points: vec![Vector3::new(0.0, 0.0, distance_m)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wrench {
    pub frame_id: String,
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

impl Wrench {
    /// Wrench with only a normal (z) force component.
    pub fn normal_force(frame_id: String, force_n: f64) -> Self {
        Self {
            frame_id,
            force: Vector3::new(0.0, 0.0, force_n),
            torque: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imu {
    pub frame_id: String,
    pub angular_velocity: Vector3<f64>,
    pub linear_acceleration: Vector3<f64>,
}
