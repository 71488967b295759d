pub mod core;
pub mod model;
pub mod nodes;
pub mod parameters;
pub mod pfs;
pub mod runner;
pub mod telemetry;
pub mod utils;
