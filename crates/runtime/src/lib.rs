//! Driving loop: owns the installed simulation, paces its steps against
//! wall-clock time and handles pause, reset and source triggers.
//!
//! # Invariants
//! - Exactly one simulation is installed at a time.
//! - Pacing state lives in the driver, never in globals.

pub mod driver;
pub mod pacer;
pub mod timer;

pub use driver::{Driver, RunReport, StepOutcome};
pub use pacer::{PacerConfig, StepPacer};
pub use timer::{StepSample, StepTimer};

pub fn crate_info() -> &'static str {
    "voxelsim-runtime v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("runtime"));
    }
}
