use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use super::{
    channels::{ChannelKey, OutputKind, RegistryError},
    datatypes::{Imu, ProximityCloud, ProximityDistance, Wrench},
    topology::FingertipId,
};
use crate::{
    core::path::Path,
    nodes::{Node, StepResult},
    telemetry::{TelemetryDispatcher, TelemetryError, TelemetryReceiver, Timestamped},
    utils::capacity::Capacity,
};

#[derive(Serialize)]
struct DumpRecord<'a, T> {
    topic: &'a str,
    stamp_us: i64,
    msg: &'a T,
}

enum OutputReceiver {
    ProximityDistance(TelemetryReceiver<ProximityDistance>),
    ProximityCloud(TelemetryReceiver<ProximityCloud>),
    Wrench(TelemetryReceiver<Wrench>),
    Imu(TelemetryReceiver<Imu>),
}

impl OutputReceiver {
    fn subscribe(
        telemetry: &impl TelemetryDispatcher,
        kind: OutputKind,
        topic: &str,
    ) -> Result<Self, TelemetryError> {
        let cap = Capacity::Unbounded;

        Ok(match kind {
            OutputKind::ProximityDistance => {
                OutputReceiver::ProximityDistance(telemetry.subscribe(topic, cap)?)
            }
            OutputKind::ProximityCloud => {
                OutputReceiver::ProximityCloud(telemetry.subscribe(topic, cap)?)
            }
            OutputKind::Force | OutputKind::Wrench => {
                OutputReceiver::Wrench(telemetry.subscribe(topic, cap)?)
            }
            OutputKind::Imu => OutputReceiver::Imu(telemetry.subscribe(topic, cap)?),
        })
    }

    fn drain(&self, out: &mut dyn Write) -> anyhow::Result<usize> {
        match self {
            OutputReceiver::ProximityDistance(rx) => drain_into(rx, out),
            OutputReceiver::ProximityCloud(rx) => drain_into(rx, out),
            OutputReceiver::Wrench(rx) => drain_into(rx, out),
            OutputReceiver::Imu(rx) => drain_into(rx, out),
        }
    }
}

fn drain_into<T: Serialize>(
    rx: &TelemetryReceiver<T>,
    out: &mut dyn Write,
) -> anyhow::Result<usize> {
    let mut written = 0;

    loop {
        let Timestamped(ts, msg) = match rx.try_recv() {
            Ok(v) => v,
            Err(TelemetryError::EmptyChannel | TelemetryError::ClosedChannel) => break,
            Err(e) => return Err(e.into()),
        };

        let record = DumpRecord {
            topic: rx.channel_name(),
            stamp_us: ts.as_micros(),
            msg: &msg,
        };

        serde_json::to_writer(&mut *out, &record)
            .with_context(|| format!("Cannot serialize message from '{}'", rx.channel_name()))?;
        writeln!(out)?;

        written += 1;
    }

    Ok(written)
}

/// Writes every routed message as one JSON line
/// `{"topic": ..., "stamp_us": ..., "msg": {...}}`.
pub struct OutputDump {
    receivers: Vec<OutputReceiver>,
    out: Box<dyn Write + Send>,
    written: usize,
}

impl OutputDump {
    pub fn new(
        telemetry: &impl TelemetryDispatcher,
        namespace: &Path,
        out: Box<dyn Write + Send>,
    ) -> Result<Self, RegistryError> {
        let mut receivers = vec![];

        for fingertip in FingertipId::all() {
            for key in ChannelKey::all(fingertip) {
                let topic = key.topic(namespace)?;
                let rx = OutputReceiver::subscribe(telemetry, key.kind, topic.as_str())?;
                receivers.push(rx);
            }
        }

        Ok(Self {
            receivers,
            out,
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Node for OutputDump {
    fn step(&mut self, _: usize) -> anyhow::Result<StepResult> {
        for rx in &self.receivers {
            self.written += rx.drain(self.out.as_mut())?;
        }

        self.out.flush()?;

        Ok(StepResult::Continue)
    }
}
