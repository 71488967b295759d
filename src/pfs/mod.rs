pub mod calibration;
pub mod channels;
pub mod config;
pub mod datatypes;
pub mod dump;
pub mod replay;
pub mod router;
pub mod topology;

pub use calibration::CalibrationTable;
pub use config::RouterConfig;
pub use router::FingertipRouter;
