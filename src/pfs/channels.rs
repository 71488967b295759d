//! Topic layout of the router.
//!
//! Inputs are `/<ns>/<gripper>/<fingertip>`. Outputs are
//! `/<ns>/<gripper>/<fingertip>/<board>/<kind>` for board-level outputs and
//! `/<ns>/<gripper>/<fingertip>/<board>/<kind>/<index>` for per-sensor ones.

use std::collections::HashMap;

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

use super::{
    datatypes::{Imu, ProximityCloud, ProximityDistance, Wrench},
    topology::{BoardId, FingertipId, SensorId},
};
use crate::{
    core::{
        path::{Path, PathError},
        time::Timestamp,
    },
    telemetry::{TelemetryDispatcher, TelemetryError, TelemetrySender},
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No output channel registered for {0:?}")]
    MissingChannel(ChannelKey),

    #[error("Output channel {key:?} does not carry {kind} messages")]
    KindMismatch { key: ChannelKey, kind: OutputKind },

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("Invalid topic name")]
    Path(#[from] PathError),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, IntoStaticStr, Display,
)]
pub enum OutputKind {
    #[strum(serialize = "proximity_distance")]
    ProximityDistance,
    #[strum(serialize = "proximity_cloud")]
    ProximityCloud,
    #[strum(serialize = "force")]
    Force,
    #[strum(serialize = "wrench")]
    Wrench,
    #[strum(serialize = "imu")]
    Imu,
}

impl OutputKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Per-sensor outputs carry the local sensor index in their topic.
    pub fn is_per_sensor(&self) -> bool {
        matches!(
            self,
            OutputKind::ProximityDistance | OutputKind::ProximityCloud | OutputKind::Force
        )
    }
}

/// Identity of one output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    pub board: BoardId,
    pub kind: OutputKind,
    pub index: Option<usize>,
}

impl ChannelKey {
    pub fn sensor(sensor: SensorId, kind: OutputKind) -> Self {
        debug_assert!(kind.is_per_sensor());
        Self {
            board: sensor.board,
            kind,
            index: Some(sensor.local),
        }
    }

    pub fn board(board: BoardId, kind: OutputKind) -> Self {
        debug_assert!(!kind.is_per_sensor());
        Self {
            board,
            kind,
            index: None,
        }
    }

    /// Every output channel of one fingertip: per-sensor channels for each
    /// existing sensor, one wrench per board and the front-board IMU.
    pub fn all(fingertip: FingertipId) -> impl Iterator<Item = ChannelKey> {
        fingertip.boards().flat_map(|board| {
            let per_sensor = board.sensors().flat_map(|sensor| {
                OutputKind::iter()
                    .filter(OutputKind::is_per_sensor)
                    .map(move |kind| ChannelKey::sensor(sensor, kind))
            });

            let per_board = OutputKind::iter()
                .filter(move |kind| match kind {
                    OutputKind::Wrench => true,
                    OutputKind::Imu => board.board.has_imu(),
                    _ => false,
                })
                .map(move |kind| ChannelKey::board(board, kind));

            per_sensor.chain(per_board)
        })
    }

    pub fn topic(&self, namespace: &Path) -> Result<Path, PathError> {
        let base = fingertip_topic(namespace, self.board.fingertip)?
            .join(self.board.board.name())?
            .join(self.kind.name())?;

        match self.index {
            Some(i) => base.join(&i.to_string()),
            None => Ok(base),
        }
    }
}

/// Input topic of a fingertip's raw samples.
pub fn fingertip_topic(namespace: &Path, fingertip: FingertipId) -> Result<Path, PathError> {
    namespace
        .join(fingertip.gripper.name())?
        .join(fingertip.fingertip.name())
}

/// A message produced by the router, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputMessage {
    ProximityDistance(ProximityDistance),
    ProximityCloud(ProximityCloud),
    Force(Wrench),
    Wrench(Wrench),
    Imu(Imu),
}

impl OutputMessage {
    pub fn kind(&self) -> OutputKind {
        match self {
            OutputMessage::ProximityDistance(_) => OutputKind::ProximityDistance,
            OutputMessage::ProximityCloud(_) => OutputKind::ProximityCloud,
            OutputMessage::Force(_) => OutputKind::Force,
            OutputMessage::Wrench(_) => OutputKind::Wrench,
            OutputMessage::Imu(_) => OutputKind::Imu,
        }
    }
}

enum OutputSender {
    ProximityDistance(TelemetrySender<ProximityDistance>),
    ProximityCloud(TelemetrySender<ProximityCloud>),
    Wrench(TelemetrySender<Wrench>),
    Imu(TelemetrySender<Imu>),
}

impl OutputSender {
    fn publish(
        telemetry: &impl TelemetryDispatcher,
        kind: OutputKind,
        topic: &str,
    ) -> Result<Self, TelemetryError> {
        Ok(match kind {
            OutputKind::ProximityDistance => {
                OutputSender::ProximityDistance(telemetry.publish(topic)?)
            }
            OutputKind::ProximityCloud => OutputSender::ProximityCloud(telemetry.publish(topic)?),
            OutputKind::Force | OutputKind::Wrench => {
                OutputSender::Wrench(telemetry.publish(topic)?)
            }
            OutputKind::Imu => OutputSender::Imu(telemetry.publish(topic)?),
        })
    }
}

/// Publishers of every output channel, created once before the first sample
/// is routed.
pub struct OutputRegistry {
    senders: HashMap<ChannelKey, OutputSender>,
}

impl OutputRegistry {
    pub fn register(
        telemetry: &impl TelemetryDispatcher,
        namespace: &Path,
    ) -> Result<Self, RegistryError> {
        let mut senders = HashMap::new();

        for fingertip in FingertipId::all() {
            for key in ChannelKey::all(fingertip) {
                let topic = key.topic(namespace)?;
                let sender = OutputSender::publish(telemetry, key.kind, topic.as_str())?;
                senders.insert(key, sender);
            }
        }

        Ok(Self { senders })
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn send(
        &self,
        key: &ChannelKey,
        timestamp: Timestamp,
        msg: OutputMessage,
    ) -> Result<(), RegistryError> {
        let sender = self
            .senders
            .get(key)
            .ok_or(RegistryError::MissingChannel(*key))?;

        if msg.kind() != key.kind {
            return Err(RegistryError::KindMismatch {
                key: *key,
                kind: msg.kind(),
            });
        }

        match (sender, msg) {
            (OutputSender::ProximityDistance(s), OutputMessage::ProximityDistance(m)) => {
                s.send(timestamp, m)
            }
            (OutputSender::ProximityCloud(s), OutputMessage::ProximityCloud(m)) => {
                s.send(timestamp, m)
            }
            (OutputSender::Wrench(s), OutputMessage::Force(m) | OutputMessage::Wrench(m)) => {
                s.send(timestamp, m)
            }
            (OutputSender::Imu(s), OutputMessage::Imu(m)) => s.send(timestamp, m),
            (_, msg) => {
                return Err(RegistryError::KindMismatch {
                    key: *key,
                    kind: msg.kind(),
                });
            }
        }

        Ok(())
    }
}
