//! Calibration: a short, timed placement session that seeds a new user's
//! ratings.

pub mod flow;
pub mod selection;
pub mod service;

// Re-export commonly used types
pub use flow::{CalibrationFlow, FinalizedCalibration};
pub use selection::select_calibration_problems;
pub use service::{CalibrationService, CalibrationStart};
