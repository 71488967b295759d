use std::sync::Arc;

use thiserror::Error;

use crate::{
    parameters::ParameterMap,
    telemetry::{
        TelemetryDispatcher, TelemetryError, TelemetryReceiver, TelemetrySender, TelemetryService,
    },
    utils::capacity::Capacity,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("A node named '{0}' already exists")]
    DuplicateNode(String),

    #[error("Error creating node '{name}'")]
    NodeInstantiation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Stop,
}

pub trait Node {
    fn step(&mut self, i: usize) -> anyhow::Result<StepResult>;
}

/// Owns the nodes of a run together with the telemetry bus and the
/// parameters they are built from.
pub struct NodeManager {
    telemetry: TelemetryService,
    parameters: Arc<ParameterMap>,
    nodes: Vec<(String, Box<dyn Node + Send>)>,
}

impl NodeManager {
    pub fn new(telemetry: TelemetryService, parameters: ParameterMap) -> Self {
        NodeManager {
            telemetry,
            parameters: Arc::new(parameters),
            nodes: vec![],
        }
    }

    pub fn add_node<F>(&mut self, name: &str, creator: F) -> Result<(), Error>
    where
        F: FnOnce(NodeContext) -> anyhow::Result<Box<dyn Node + Send>>,
    {
        if self.nodes.iter().any(|(n, _)| n == name) {
            return Err(Error::DuplicateNode(name.to_string()));
        }

        let context = NodeContext {
            telemetry: NodeTelemetry::new(self.telemetry.clone()),
            parameters: self.parameters.clone(),
        };

        let node = creator(context).map_err(|e| Error::NodeInstantiation {
            name: name.to_string(),
            source: e.into(),
        })?;

        self.nodes.push((name.to_string(), node));

        Ok(())
    }

    pub fn nodes(&self) -> &[(String, Box<dyn Node + Send>)] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [(String, Box<dyn Node + Send>)] {
        &mut self.nodes
    }

    pub fn parameters(&self) -> Arc<ParameterMap> {
        self.parameters.clone()
    }

    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }
}

pub struct NodeContext {
    telemetry: NodeTelemetry,
    parameters: Arc<ParameterMap>,
}

impl NodeContext {
    pub fn telemetry(&self) -> &NodeTelemetry {
        &self.telemetry
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }
}

#[derive(Debug)]
pub struct NodeTelemetry {
    telemetry: TelemetryService,
}

impl NodeTelemetry {
    pub fn new(telemetry: TelemetryService) -> Self {
        NodeTelemetry { telemetry }
    }
}

impl TelemetryDispatcher for NodeTelemetry {
    fn publish<T: 'static + Send>(
        &self,
        channel_name: &str,
    ) -> Result<TelemetrySender<T>, TelemetryError> {
        self.telemetry.publish::<T>(channel_name)
    }

    fn subscribe<T: 'static + Send>(
        &self,
        channel_name: &str,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError> {
        self.telemetry.subscribe::<T>(channel_name, capacity)
    }
}
