use crate::{
    core::path::Path,
    parameters::{Error, ParameterMap},
    utils::capacity::Capacity,
};

pub const DEFAULT_NAMESPACE: &str = "pfs";
pub const DEFAULT_INPUT_QUEUE: usize = 1;

/// Settings under `router` in the parameter file. Every entry is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// First segment of every input and output topic.
    pub namespace: Path,
    /// Queue depth of the raw sample subscriptions, 0 for unbounded.
    pub input_queue: Capacity,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            namespace: namespace_path(DEFAULT_NAMESPACE).expect("default namespace is valid"),
            input_queue: DEFAULT_INPUT_QUEUE.into(),
        }
    }
}

fn namespace_path(namespace: &str) -> Option<Path> {
    Path::from_str("/").ok()?.join(namespace).ok()
}

impl RouterConfig {
    pub fn from_parameters(params: &ParameterMap) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(p) = params.get_param_opt("router.namespace")? {
            let namespace = p.value_string()?;
            config.namespace = namespace_path(namespace).ok_or_else(|| Error::BadCast {
                path: p.path().to_string(),
                dtype: "topic namespace".to_string(),
            })?;
        }

        if let Some(p) = params.get_param_opt("router.input_queue")? {
            let depth = p.value_int()?;
            let depth = usize::try_from(depth).map_err(|_| Error::BadCast {
                path: p.path().to_string(),
                dtype: "queue depth".to_string(),
            })?;
            config.input_queue = depth.into();
        }

        Ok(config)
    }
}
