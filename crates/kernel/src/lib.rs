//! Simulation kernel: the lifecycle contract every voxel simulation
//! implements, plus the built-in simulations.
//!
//! # Invariants
//! - `simulation_time` only grows by the dt each step reports having applied.
//! - Voxel positions are fixed at construction; steps only recolor.
//! - The voxel array is stable between calls to `step`.

pub mod fdtd;
pub mod life;
pub mod simulation;

pub use fdtd::{Boundary, FdtdConfig, FieldComponent, MaterialRegion, Maxwell, Medium, SourceConfig};
pub use life::{GameOfLife3D, LifeConfig};
pub use simulation::{BaseState, DEFAULT_STEP_SIZE, SimError, Simulation, check_dt};

pub fn crate_info() -> &'static str {
    "voxelsim-kernel v0.1.0"
}
