use voxelsim_common::{Color, GridError, GridSize, Voxel};

/// Nominal step size reported by simulations that do not define their own.
pub const DEFAULT_STEP_SIZE: f64 = 1.0;

/// Errors raised by simulation lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("{operation} is not supported by {simulation}")]
    Unsupported {
        operation: &'static str,
        simulation: &'static str,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("requested dt must be finite and non-negative, got {0}")]
    InvalidStep(f64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept a requested dt only if time can advance by it.
pub fn check_dt(dt: f64) -> Result<f64, SimError> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(dt)
    } else {
        Err(SimError::InvalidStep(dt))
    }
}

/// Lifecycle contract shared by every stepped voxel simulation.
///
/// A driver calls [`Simulation::step`] and then reads [`Simulation::voxels`];
/// the voxel array reflects the most recent `step` or `init_random_state`
/// and does not change between those calls.
pub trait Simulation {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// (Re)initialize all state to a fresh start and reset simulation time.
    fn init_random_state(&mut self) -> Result<(), SimError>;

    /// Advance by one tick. `dt` is a request; the returned value is the time
    /// that actually passed and is what callers must accumulate.
    fn step(&mut self, dt: f64) -> Result<f64, SimError>;

    fn grid_size(&self) -> GridSize;

    fn voxels(&self) -> &[Voxel];

    /// Sum of all actual dts applied since the last reset.
    fn simulation_time(&self) -> f64;

    /// Nominal time per step, used by drivers to pace stepping.
    fn step_size(&self) -> f64;

    /// Toggle an excitation source. No-op for simulations without one.
    fn trigger_source(&mut self) {}
}

impl<S: Simulation + ?Sized> Simulation for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init_random_state(&mut self) -> Result<(), SimError> {
        (**self).init_random_state()
    }

    fn step(&mut self, dt: f64) -> Result<f64, SimError> {
        (**self).step(dt)
    }

    fn grid_size(&self) -> GridSize {
        (**self).grid_size()
    }

    fn voxels(&self) -> &[Voxel] {
        (**self).voxels()
    }

    fn simulation_time(&self) -> f64 {
        (**self).simulation_time()
    }

    fn step_size(&self) -> f64 {
        (**self).step_size()
    }

    fn trigger_source(&mut self) {
        (**self).trigger_source()
    }
}

/// State every simulation carries: grid, voxel array and the time accumulator.
///
/// Voxel positions are assigned here, once, in canonical index order.
#[derive(Debug, Clone)]
pub struct BaseState {
    grid: GridSize,
    voxels: Vec<Voxel>,
    simulation_time: f64,
    step_size: f64,
}

impl BaseState {
    /// Allocate the voxel array for `grid`, every voxel colored `color`.
    pub fn new(grid: GridSize, color: Color) -> Result<Self, GridError> {
        let len = grid.checked_len()?;
        let mut voxels = Vec::new();
        voxels
            .try_reserve_exact(len)
            .map_err(|_| GridError::TooLarge { grid })?;
        voxels.extend(grid.coords().map(|c| Voxel::new(c, color)));
        Ok(Self {
            grid,
            voxels,
            simulation_time: 0.0,
            step_size: DEFAULT_STEP_SIZE,
        })
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Mutable voxel access. Positions must not be changed by callers.
    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn set_step_size(&mut self, step_size: f64) {
        self.step_size = step_size;
    }

    /// Accumulate the dt a step actually applied.
    pub fn advance(&mut self, actual_dt: f64) {
        self.simulation_time += actual_dt;
    }

    pub fn reset_time(&mut self) {
        self.simulation_time = 0.0;
    }

    /// Set every voxel to `color`.
    pub fn fill(&mut self, color: Color) {
        for voxel in &mut self.voxels {
            voxel.color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelsim_common::{BLANK, SimCoords};

    #[test]
    fn base_state_assigns_positions_in_index_order() {
        let grid = GridSize::new(2, 3, 2);
        let base = BaseState::new(grid, BLANK).unwrap();
        assert_eq!(base.voxels().len(), 12);
        for (i, voxel) in base.voxels().iter().enumerate() {
            assert_eq!(grid.index(voxel.position).unwrap(), i);
            assert_eq!(voxel.color, BLANK);
        }
        assert_eq!(base.voxels()[7].position, SimCoords::new(0, 1, 1));
    }

    #[test]
    fn advance_and_reset_time() {
        let mut base = BaseState::new(GridSize::new(1, 1, 1), BLANK).unwrap();
        assert_eq!(base.step_size(), DEFAULT_STEP_SIZE);
        base.advance(0.25);
        base.advance(0.5);
        assert_eq!(base.simulation_time(), 0.75);
        base.reset_time();
        assert_eq!(base.simulation_time(), 0.0);
    }

    #[test]
    fn fill_recolors_without_moving() {
        let mut base = BaseState::new(GridSize::new(2, 2, 1), BLANK).unwrap();
        base.fill([9, 8, 7, 6]);
        assert!(base.voxels().iter().all(|v| v.color == [9, 8, 7, 6]));
        assert_eq!(base.voxels()[3].position, SimCoords::new(1, 1, 0));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let grid = GridSize::new(u32::MAX, u32::MAX, u32::MAX);
        assert!(BaseState::new(grid, BLANK).is_err());
    }

    #[test]
    fn check_dt_rejects_backwards_and_non_finite_steps() {
        assert_eq!(check_dt(0.0).unwrap(), 0.0);
        assert_eq!(check_dt(0.25).unwrap(), 0.25);
        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(check_dt(bad), Err(SimError::InvalidStep(_))));
        }
    }

    #[test]
    fn unsupported_error_names_the_operation() {
        let err = SimError::Unsupported {
            operation: "init_random_state",
            simulation: "playback",
        };
        assert_eq!(
            err.to_string(),
            "init_random_state is not supported by playback"
        );
    }
}
