use std::{collections::HashMap, path::Path, time::Instant};

pub use anyhow::Result;
use log::info;

use crate::{
    model::ModelBuilder,
    nodes::{NodeManager, SequentialExecutor},
    parameters::parameters,
    telemetry::TelemetryService,
};

/// Runs a model on the calling thread until its source is exhausted.
pub struct Runner {
    nm: NodeManager,
}

impl Runner {
    /// Reads the parameter file and builds every node of `model`. Fails
    /// before any sample is processed if the parameters are incomplete.
    pub fn new(
        model: impl ModelBuilder,
        params: &Path,
        remap: HashMap<String, String>,
    ) -> Result<Self> {
        info!("Reading parameters from '{}'", params.display());
        let params = parameters::parse_file(params)?;

        for (from, to) in remap.iter() {
            info!("Remapping '{from}' to '{to}'");
        }

        let ts = TelemetryService::new(remap);

        info!("Initializing node manager");
        let mut nm = NodeManager::new(ts.clone(), params);

        model.build(&mut nm)?;

        info!("{} channels registered", ts.num_channels());

        Ok(Self { nm })
    }

    /// Returns the number of executed steps.
    pub fn run_blocking(self) -> Result<usize> {
        let start_time = Instant::now();

        let steps = SequentialExecutor::run_blocking(self.nm)?;

        let duration = (Instant::now() - start_time).as_secs_f64();
        info!("Run ended after {steps} steps. Duration: {duration:.6} s");

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        io::{Cursor, Write},
        sync::{Arc, Mutex},
    };

    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::{
        model::RouterModel,
        pfs::calibration::tests::{calibration_toml, test_sensor},
    };

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_line(gripper: &str, fingertip: &str, stamp_us: i64) -> String {
        let mut proximity = vec!["0"; 24];
        proximity[0] = "10";
        let force = vec!["2000"; 24];

        format!(
            "{{\"gripper\": \"{gripper}\", \"fingertip\": \"{fingertip}\", \"stamp_us\": {stamp_us}, \"proximity\": [{}], \"force\": [{}], \"imu\": {{\"angular_velocity\": [1000, 0, 0], \"linear_acceleration\": [0, 0, 9810]}}}}",
            proximity.join(","),
            force.join(",")
        )
    }

    fn write_params(name: &str, extra: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pfs_router_{name}_{}.toml",
            std::process::id()
        ));
        let toml = format!("{extra}\n{}", calibration_toml(test_sensor()));
        fs::write(&path, toml).unwrap();
        path
    }

    #[test]
    fn test_end_to_end() -> Result<()> {
        let params = write_params("e2e", "");
        let input = [
            sample_line("l_gripper", "l_fingertip", 10),
            sample_line("r_gripper", "r_fingertip", 20),
        ]
        .join("\n");

        let out = SharedBuf::default();
        let model = RouterModel::new(Box::new(Cursor::new(input)), Some(Box::new(out.clone())));
        let stats = model.stats();

        let runner = Runner::new(model, &params, HashMap::new())?;
        let steps = runner.run_blocking()?;
        fs::remove_file(&params)?;

        // Two samples, then the pass that hits the end of the input
        assert_eq!(steps, 3);
        assert_eq!(stats.samples(), 2);

        let buf = out.0.lock().unwrap();
        let lines: Vec<Value> = String::from_utf8_lossy(&buf)
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;

        // 1 distance + 1 cloud + 24 forces + 5 wrenches + 1 imu, per sample
        assert_eq!(lines.len(), 2 * 32);
        assert_eq!(stats.messages(), lines.len());

        let imus: Vec<_> = lines
            .iter()
            .filter(|v| v["topic"].as_str().is_some_and(|t| t.ends_with("/imu")))
            .collect();
        assert_eq!(imus.len(), 2);
        assert_eq!(imus[0]["topic"], "/pfs/l_gripper/l_fingertip/pfs_a_front/imu");
        assert_eq!(imus[0]["stamp_us"], 10);
        assert_eq!(imus[1]["msg"]["frame_id"], "/r_gripper_r_fingertip_pfs_a_front");

        assert!(lines.iter().any(|v| {
            v["topic"] == "/pfs/r_gripper/r_fingertip/pfs_a_front/proximity_cloud/0"
                && v["stamp_us"] == 20
        }));

        Ok(())
    }

    #[test]
    fn test_remap_and_namespace() -> Result<()> {
        let params = write_params(
            "remap",
            "[router]\nnamespace = { val = \"tactile\", type = \"str\" }\n",
        );
        let input = sample_line("l_gripper", "r_fingertip", 5);

        let remap = HashMap::from([(
            "/tactile/l_gripper/r_fingertip/pfs_a_front/imu".to_string(),
            "/imu".to_string(),
        )]);

        let out = SharedBuf::default();
        let model = RouterModel::new(Box::new(Cursor::new(input)), Some(Box::new(out.clone())));

        Runner::new(model, &params, remap)?.run_blocking()?;
        fs::remove_file(&params)?;

        let buf = out.0.lock().unwrap();
        let topics: Vec<String> = String::from_utf8_lossy(&buf)
            .lines()
            .map(|l| {
                serde_json::from_str::<Value>(l)
                    .map(|v| v["topic"].as_str().unwrap_or_default().to_string())
            })
            .collect::<Result<_, _>>()?;

        assert_eq!(topics.iter().filter(|t| *t == "/imu").count(), 1);
        assert!(
            topics
                .iter()
                .filter(|t| *t != "/imu")
                .all(|t| t.starts_with("/tactile/l_gripper/r_fingertip/"))
        );

        Ok(())
    }

    #[test]
    fn test_missing_params_file() {
        let model = RouterModel::new(Box::new(Cursor::new("")), None);
        let res = Runner::new(model, Path::new("/nonexistent/params.toml"), HashMap::new());

        assert!(res.is_err());
    }
}
