//! Core engine: the scan → merge → notify loop and the autopilot.

pub mod alert;
pub mod merge;
pub mod notify;
pub mod scheduler;
pub mod state;
pub mod task;

pub use scheduler::{CycleReport, ScanContext, ScanSettings, Scheduler};
pub use state::{ScanState, ScanStatus};
