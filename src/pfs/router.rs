use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use log::{debug, info};

use super::{
    calibration::{CalibrationTable, FingertipCalibration, IMU_SCALE, imu_scale, passes_gate},
    channels::{
        ChannelKey, OutputKind, OutputMessage, OutputRegistry, RegistryError, fingertip_topic,
    },
    config::RouterConfig,
    datatypes::{FingertipSensorSample, Imu, ProximityCloud, ProximityDistance, Wrench},
    topology::FingertipId,
};
use crate::{
    core::time::Timestamp,
    nodes::{Node, StepResult},
    telemetry::{TelemetryDispatcher, TelemetryError, TelemetryReceiver, Timestamped},
};

/// Counters shared between the router and whoever is watching it.
#[derive(Debug, Default)]
pub struct RouterStats {
    samples: AtomicUsize,
    messages: AtomicUsize,
}

impl RouterStats {
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn messages(&self) -> usize {
        self.messages.load(Ordering::Relaxed)
    }
}

/// Every message derived from one raw sample, in publication order.
///
/// Boards are visited front to back. For each board the per-sensor distance
/// and cloud (only when the distance passes the gate) and force come first,
/// then the board's average force and, for the front board, the IMU.
pub fn derive_outputs(
    id: FingertipId,
    calibration: &FingertipCalibration,
    sample: &FingertipSensorSample,
) -> Vec<(ChannelKey, OutputMessage)> {
    let mut out = vec![];

    for board in id.boards() {
        let mut average_force = 0.0;

        for sensor in board.sensors() {
            let i = sensor.global_index();
            let coeffs = calibration.sensor(i);

            let distance = coeffs.distance(sample.proximity[i]);
            if passes_gate(distance) {
                let distance = distance as f32;

                out.push((
                    ChannelKey::sensor(sensor, OutputKind::ProximityDistance),
                    OutputMessage::ProximityDistance(ProximityDistance {
                        frame_id: sensor.frame_id(),
                        distance_m: distance,
                    }),
                ));
                out.push((
                    ChannelKey::sensor(sensor, OutputKind::ProximityCloud),
                    OutputMessage::ProximityCloud(ProximityCloud::single_point(
                        sensor.frame_id(),
                        distance,
                    )),
                ));
            }

            let force = coeffs.force(sample.force[i]);
            average_force += force / board.board.sensor_count() as f64;

            out.push((
                ChannelKey::sensor(sensor, OutputKind::Force),
                OutputMessage::Force(Wrench::normal_force(sensor.frame_id(), force)),
            ));
        }

        out.push((
            ChannelKey::board(board, OutputKind::Wrench),
            OutputMessage::Wrench(Wrench::normal_force(board.frame_id(), average_force)),
        ));

        if board.board.has_imu() {
            out.push((
                ChannelKey::board(board, OutputKind::Imu),
                OutputMessage::Imu(Imu {
                    frame_id: board.frame_id(),
                    angular_velocity: imu_scale(&sample.imu.angular_velocity, IMU_SCALE),
                    linear_acceleration: imu_scale(&sample.imu.linear_acceleration, IMU_SCALE),
                }),
            ));
        }
    }

    out
}

/// Splits the raw samples of every fingertip into calibrated, per-sensor
/// outputs.
pub struct FingertipRouter {
    calibration: Arc<CalibrationTable>,
    outputs: OutputRegistry,
    inputs: Vec<(FingertipId, TelemetryReceiver<FingertipSensorSample>)>,
    stats: Arc<RouterStats>,
}

impl FingertipRouter {
    /// Registers every output channel and subscribes to the four fingertip
    /// inputs. No sample is accepted before this completes.
    pub fn new(
        telemetry: &impl TelemetryDispatcher,
        config: &RouterConfig,
        calibration: Arc<CalibrationTable>,
    ) -> Result<Self, RegistryError> {
        let outputs = OutputRegistry::register(telemetry, &config.namespace)?;

        let inputs = FingertipId::all()
            .map(|id| -> Result<_, RegistryError> {
                let topic = fingertip_topic(&config.namespace, id)?;
                let rx = telemetry.subscribe(topic.as_str(), config.input_queue)?;
                Ok((id, rx))
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        info!(
            "Router ready on '{}': {} inputs, {} outputs",
            config.namespace,
            inputs.len(),
            outputs.len()
        );

        Ok(Self {
            calibration,
            outputs,
            inputs,
            stats: Arc::default(),
        })
    }

    /// Reports into externally owned counters.
    pub fn with_stats(mut self, stats: Arc<RouterStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> Arc<RouterStats> {
        self.stats.clone()
    }

    /// Publishes every output of one sample with the sample's timestamp.
    /// Returns the number of published messages.
    pub fn route(
        &self,
        id: FingertipId,
        timestamp: Timestamp,
        sample: &FingertipSensorSample,
    ) -> Result<usize, RegistryError> {
        let outputs = derive_outputs(id, self.calibration.fingertip(id), sample);
        let count = outputs.len();

        for (key, msg) in outputs {
            self.outputs.send(&key, timestamp, msg)?;
        }

        self.stats.samples.fetch_add(1, Ordering::Relaxed);
        self.stats.messages.fetch_add(count, Ordering::Relaxed);

        Ok(count)
    }
}

impl Node for FingertipRouter {
    fn step(&mut self, i: usize) -> anyhow::Result<StepResult> {
        for (id, rx) in &self.inputs {
            loop {
                match rx.try_recv() {
                    Ok(Timestamped(ts, sample)) => {
                        let count = self.route(*id, ts, &sample)?;
                        debug!(
                            "Step {i}: routed {} {} into {count} messages",
                            id.gripper, id.fingertip
                        );
                    }
                    Err(TelemetryError::EmptyChannel | TelemetryError::ClosedChannel) => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(StepResult::Continue)
    }
}
