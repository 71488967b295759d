use std::{
    io::{BufRead, Write},
    sync::Arc,
};

use anyhow::Result;

use crate::{
    core::time::SystemClock,
    nodes::NodeManager,
    pfs::{
        CalibrationTable, FingertipRouter, RouterConfig,
        calibration::CALIBRATION_ROOT,
        dump::OutputDump,
        replay::SampleReplay,
        router::RouterStats,
    },
};

pub trait ModelBuilder {
    fn build(self, node_manager: &mut NodeManager) -> Result<()>;
}

/// Replay source feeding the router, with an optional dump of everything the
/// router publishes.
pub struct RouterModel {
    input: Box<dyn BufRead + Send>,
    dump: Option<Box<dyn Write + Send>>,
    stats: Arc<RouterStats>,
}

impl RouterModel {
    pub fn new(input: Box<dyn BufRead + Send>, dump: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            input,
            dump,
            stats: Arc::default(),
        }
    }

    pub fn stats(&self) -> Arc<RouterStats> {
        self.stats.clone()
    }
}

impl ModelBuilder for RouterModel {
    fn build(self, nm: &mut NodeManager) -> Result<()> {
        let RouterModel { input, dump, stats } = self;

        let params = nm.parameters();
        let config = RouterConfig::from_parameters(&params)?;
        let calibration = Arc::new(CalibrationTable::from_parameters(
            params.get_map(CALIBRATION_ROOT)?,
        )?);

        nm.add_node("replay", |ctx| {
            Ok(Box::new(SampleReplay::new(
                ctx.telemetry(),
                &config.namespace,
                input,
                Box::new(SystemClock),
            )?))
        })?;

        nm.add_node("router", |ctx| {
            let router = FingertipRouter::new(ctx.telemetry(), &config, calibration)?;
            Ok(Box::new(router.with_stats(stats)))
        })?;

        if let Some(out) = dump {
            nm.add_node("dump", |ctx| {
                Ok(Box::new(OutputDump::new(
                    ctx.telemetry(),
                    &config.namespace,
                    out,
                )?))
            })?;
        }

        Ok(())
    }
}
