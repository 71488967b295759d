use anyhow::{Context, Result};
use log::{debug, info};

use super::{NodeManager, StepResult};

/// Steps every node in registration order, on the calling thread.
///
/// A step pass always runs to the end, so nodes registered after the one
/// requesting the stop still see the data it produced in that pass.
pub struct SequentialExecutor;

impl SequentialExecutor {
    /// Runs until a node returns [`StepResult::Stop`]. Returns the number of
    /// completed passes.
    pub fn run_blocking(mut nm: NodeManager) -> Result<usize> {
        info!("Running {} nodes", nm.nodes().len());

        let mut i = 0usize;
        loop {
            let mut stop = false;

            for (name, node) in nm.nodes_mut().iter_mut() {
                let res = node
                    .step(i)
                    .with_context(|| format!("Node '{name}' failed at step {i}"))?;

                if res == StepResult::Stop {
                    debug!("Node '{name}' requested stop at step {i}");
                    stop = true;
                }
            }

            i += 1;

            if stop {
                return Ok(i);
            }
        }
    }
}
