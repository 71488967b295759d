use std::io::BufRead;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use super::{
    channels::{RegistryError, fingertip_topic},
    datatypes::{FingertipSensorSample, ImuSample},
    topology::{Fingertip, FingertipId, Gripper, NUM_SENSORS},
};
use crate::{
    core::{
        path::Path,
        time::{Clock, Timestamp},
    },
    nodes::{Node, StepResult},
    telemetry::{TelemetryDispatcher, TelemetrySender},
};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Error reading line {line}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed sample on line {line}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Timestamp {stamp_us} on line {line} is out of range")]
    Timestamp { line: usize, stamp_us: i64 },
}

/// One line of a replay file.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleRecord {
    pub gripper: Gripper,
    pub fingertip: Fingertip,
    /// Microseconds since the unix epoch. The replay clock is used when
    /// missing.
    #[serde(default)]
    pub stamp_us: Option<i64>,
    pub proximity: [u16; NUM_SENSORS],
    pub force: [u16; NUM_SENSORS],
    pub imu: ImuSample,
}

impl SampleRecord {
    pub fn id(&self) -> FingertipId {
        FingertipId::new(self.gripper, self.fingertip)
    }

    pub fn sample(&self) -> FingertipSensorSample {
        FingertipSensorSample {
            proximity: self.proximity,
            force: self.force,
            imu: self.imu.clone(),
        }
    }
}

/// Publishes raw fingertip samples read from a JSON-lines source, one per
/// step. Blank lines are skipped. Stops at the end of the input.
pub struct SampleReplay {
    reader: Box<dyn BufRead + Send>,
    clock: Box<dyn Clock + Send>,
    /// One sender per fingertip, indexed by [`FingertipId::index`].
    senders: Vec<TelemetrySender<FingertipSensorSample>>,
    line: usize,
    published: usize,
}

impl SampleReplay {
    pub fn new(
        telemetry: &impl TelemetryDispatcher,
        namespace: &Path,
        reader: Box<dyn BufRead + Send>,
        clock: Box<dyn Clock + Send>,
    ) -> Result<Self, RegistryError> {
        let senders = FingertipId::all()
            .map(|id| -> Result<_, RegistryError> {
                let topic = fingertip_topic(namespace, id)?;
                Ok(telemetry.publish(topic.as_str())?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            reader,
            clock,
            senders,
            line: 0,
            published: 0,
        })
    }

    /// Next non blank record, `None` at the end of the input.
    fn next_record(&mut self) -> Result<Option<SampleRecord>, ReplayError> {
        let mut buf = String::new();

        loop {
            buf.clear();
            self.line += 1;

            let read = self
                .reader
                .read_line(&mut buf)
                .map_err(|source| ReplayError::Io {
                    line: self.line,
                    source,
                })?;

            if read == 0 {
                return Ok(None);
            }

            if buf.trim().is_empty() {
                continue;
            }

            return serde_json::from_str(&buf)
                .map(Some)
                .map_err(|source| ReplayError::Parse {
                    line: self.line,
                    source,
                });
        }
    }

    fn timestamp(&self, record: &SampleRecord) -> Result<Timestamp, ReplayError> {
        match record.stamp_us {
            Some(stamp_us) => Timestamp::from_micros(stamp_us).ok_or(ReplayError::Timestamp {
                line: self.line,
                stamp_us,
            }),
            None => Ok(Timestamp::now(self.clock.as_ref())),
        }
    }
}

impl Node for SampleReplay {
    fn step(&mut self, i: usize) -> anyhow::Result<StepResult> {
        let Some(record) = self.next_record()? else {
            info!("Replay finished after {} samples", self.published);
            return Ok(StepResult::Stop);
        };

        let ts = self.timestamp(&record)?;
        let id = record.id();

        debug!(
            "Step {i}: replaying line {} for {} {}",
            self.line, id.gripper, id.fingertip
        );

        self.senders[id.index()].send(ts, record.sample());
        self.published += 1;

        Ok(StepResult::Continue)
    }
}
