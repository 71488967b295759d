//! Conversion of raw fingertip readings into physical units.
//!
//! Proximity follows an inverse-square model `I = a / d^2 + b`, solved for
//! the distance `d` in meters. Force follows the linear model of the force
//! sensor datasheet:
//!
//! `(raw - preload) * adc_resolution = gain * force * sensitivity`
//!
//! with `adc_resolution = 3.3 V * 1000 / 4096 = 0.806 mV` and
//! `gain = 1 + 100 kOhm / 15 kOhm = 7.667`, which gives
//! `force [N] = 0.105 * (raw - preload) / sensitivity [mV/N]`.

use log::{debug, info};
use nalgebra::Vector3;
use thiserror::Error;

use super::topology::{FingertipId, NUM_SENSORS};
use crate::parameters::{self, ParameterMap};

/// `adc_resolution / gain`, in mV per count.
pub const FORCE_SCALE: f64 = 0.105;

/// Lower bound of `raw - b` in the proximity model. Keeps the square root
/// finite and real when the reading is at or below the calibrated offset.
pub const PROXIMITY_DENOMINATOR_FLOOR: f64 = 0.1;

/// Distances at or beyond this value (meters) are not trusted.
pub const PROXIMITY_GATE_M: f64 = 0.1;

/// Raw IMU units to physical units, for both gyro and accelerometer.
pub const IMU_SCALE: f64 = 0.001;

/// Root of the calibration tree in the parameter file.
pub const CALIBRATION_ROOT: &str = "pfs";

pub const CALIBRATION_FIELDS: [&str; 4] =
    ["proximity_a", "proximity_b", "preload", "sensitivity"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalibrationError {
    #[error(transparent)]
    Parameter(#[from] parameters::Error),

    #[error("Calibration '{path}' has {found} entries, expected {expected}")]
    WrongLength {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("Calibration '{path}' has sensitivity {value} at index {index}")]
    InvalidSensitivity {
        path: String,
        index: usize,
        value: f64,
    },

    #[error("Calibration '{path}' has negative proximity gain {value} at index {index}")]
    NegativeProximityGain {
        path: String,
        index: usize,
        value: f64,
    },

    #[error("Calibration '{path}' has a non finite value at index {index}")]
    NonFinite { path: String, index: usize },
}

/// Distance in meters from a raw proximity reading. `a == 0` marks an
/// uncalibrated sensor and yields an infinite distance.
pub fn proximity_to_distance(raw: f64, a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return f64::INFINITY;
    }

    (a / (raw - b).max(PROXIMITY_DENOMINATOR_FLOOR)).sqrt()
}

/// Force in Newtons from a raw force reading. `sensitivity` must be non zero,
/// which [`CalibrationTable`] guarantees for loaded coefficients.
pub fn force_from_raw(raw: f64, preload: f64, sensitivity: f64) -> f64 {
    FORCE_SCALE * (raw - preload) / sensitivity
}

pub fn imu_scale(raw: &Vector3<f64>, scale: f64) -> Vector3<f64> {
    raw * scale
}

/// Whether a distance is close enough to be published.
pub fn passes_gate(distance_m: f64) -> bool {
    distance_m < PROXIMITY_GATE_M
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorCalibration {
    pub proximity_a: f64,
    pub proximity_b: f64,
    pub preload: f64,
    pub sensitivity: f64,
}

impl SensorCalibration {
    pub fn distance(&self, raw_proximity: u16) -> f64 {
        proximity_to_distance(raw_proximity as f64, self.proximity_a, self.proximity_b)
    }

    pub fn force(&self, raw_force: u16) -> f64 {
        force_from_raw(raw_force as f64, self.preload, self.sensitivity)
    }

    pub fn is_proximity_calibrated(&self) -> bool {
        self.proximity_a != 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FingertipCalibration {
    sensors: [SensorCalibration; NUM_SENSORS],
}

impl FingertipCalibration {
    pub fn new(sensors: [SensorCalibration; NUM_SENSORS]) -> Self {
        Self { sensors }
    }

    /// Reads the four coefficient arrays of one fingertip.
    pub fn from_parameters(params: &ParameterMap) -> Result<Self, CalibrationError> {
        let [proximity_a, proximity_b, preload, sensitivity] =
            CALIBRATION_FIELDS.map(|field| read_coefficients(params, field));

        let proximity_a = proximity_a?;
        let proximity_b = proximity_b?;
        let preload = preload?;
        let sensitivity = sensitivity?;

        for (index, &value) in sensitivity.iter().enumerate() {
            if value == 0.0 {
                return Err(CalibrationError::InvalidSensitivity {
                    path: format!("{}.sensitivity", params.path()),
                    index,
                    value,
                });
            }
        }

        // a == 0 marks an uncalibrated sensor, a < 0 has no real distance
        if let Some(index) = proximity_a.iter().position(|&a| a < 0.0) {
            return Err(CalibrationError::NegativeProximityGain {
                path: format!("{}.proximity_a", params.path()),
                index,
                value: proximity_a[index],
            });
        }

        let sensors = std::array::from_fn(|i| SensorCalibration {
            proximity_a: proximity_a[i],
            proximity_b: proximity_b[i],
            preload: preload[i],
            sensitivity: sensitivity[i],
        });

        Ok(Self { sensors })
    }

    /// Coefficients of the sensor with the given global index.
    pub fn sensor(&self, global_index: usize) -> &SensorCalibration {
        &self.sensors[global_index]
    }

    pub fn num_uncalibrated(&self) -> usize {
        self.sensors
            .iter()
            .filter(|s| !s.is_proximity_calibrated())
            .count()
    }
}

fn read_coefficients(
    params: &ParameterMap,
    field: &str,
) -> Result<[f64; NUM_SENSORS], CalibrationError> {
    let param = params.get_param(field)?;
    let values = param.value_float_arr()?;

    let values: [f64; NUM_SENSORS] =
        values.try_into().map_err(|_| CalibrationError::WrongLength {
            path: param.path().to_string(),
            expected: NUM_SENSORS,
            found: values.len(),
        })?;

    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(CalibrationError::NonFinite {
            path: param.path().to_string(),
            index,
        });
    }

    Ok(values)
}

/// Calibration of every fingertip, loaded once at startup and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    // Indexed by `FingertipId::index`
    fingertips: Vec<FingertipCalibration>,
}

impl CalibrationTable {
    /// Loads `<gripper>.<fingertip>.<field>` for every fingertip from `params`.
    /// Any missing or malformed entry fails the whole table.
    pub fn from_parameters(params: &ParameterMap) -> Result<Self, CalibrationError> {
        let mut fingertips = Vec::with_capacity(4);

        for id in FingertipId::all() {
            let map = params.get_map(&format!("{}.{}", id.gripper, id.fingertip))?;
            let calibration = FingertipCalibration::from_parameters(map)?;

            info!(
                "Loaded calibration for {} {} ({} sensors without proximity calibration)",
                id.gripper,
                id.fingertip,
                calibration.num_uncalibrated()
            );
            debug!("{} {}: {:?}", id.gripper, id.fingertip, calibration.sensors);

            fingertips.push(calibration);
        }

        Ok(Self { fingertips })
    }

    pub fn fingertip(&self, id: FingertipId) -> &FingertipCalibration {
        &self.fingertips[id.index()]
    }
}
