use std::time::Instant;
use voxelsim_common::{GridSize, Voxel};
use voxelsim_kernel::{SimError, Simulation};

use crate::pacer::{PacerConfig, StepPacer};
use crate::timer::StepTimer;

/// What a single [`Driver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Stepping is paused; nothing happened.
    Paused,
    /// The next step is not due yet.
    Waiting,
    /// One step ran and this much simulation time passed.
    Advanced(f64),
    /// A step ran but reported no elapsed time.
    Exhausted,
}

/// Totals from a headless [`Driver::run_steps`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunReport {
    pub steps: u64,
    pub elapsed: f64,
    pub exhausted: bool,
}

/// Owns the active simulation and decides when it steps.
pub struct Driver {
    simulation: Box<dyn Simulation>,
    pacer: StepPacer,
    timer: StepTimer,
    paused: bool,
    steps: u64,
}

impl Driver {
    pub fn new(simulation: Box<dyn Simulation>, config: PacerConfig) -> Self {
        tracing::info!(
            simulation = simulation.name(),
            grid = %simulation.grid_size(),
            "driver started"
        );
        Self {
            simulation,
            pacer: StepPacer::new(config),
            timer: StepTimer::default(),
            paused: false,
            steps: 0,
        }
    }

    /// Install a new simulation and return the previous one.
    pub fn set_simulation(&mut self, simulation: Box<dyn Simulation>) -> Box<dyn Simulation> {
        tracing::info!(
            from = self.simulation.name(),
            to = simulation.name(),
            grid = %simulation.grid_size(),
            "simulation replaced"
        );
        self.pacer.reset();
        self.timer.clear();
        self.steps = 0;
        std::mem::replace(&mut self.simulation, simulation)
    }

    /// Re-initialize the simulation and make the next step due at once.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.simulation.init_random_state()?;
        self.pacer.reset();
        self.timer.clear();
        self.steps = 0;
        Ok(())
    }

    /// Flip the pause flag; returns the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        tracing::info!(paused = self.paused, "pause toggled");
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn trigger_source(&mut self) {
        tracing::debug!(simulation = self.simulation.name(), "source triggered");
        self.simulation.trigger_source();
    }

    /// Step once if not paused and a step is due at wall-clock `now`.
    pub fn tick(&mut self, now: f64) -> Result<StepOutcome, SimError> {
        if self.paused {
            return Ok(StepOutcome::Paused);
        }
        if !self.pacer.due(now) {
            return Ok(StepOutcome::Waiting);
        }
        let dt = self.timed_step()?;
        self.pacer.schedule(now, self.simulation.step_size());
        if dt == 0.0 {
            return Ok(StepOutcome::Exhausted);
        }
        Ok(StepOutcome::Advanced(dt))
    }

    /// Step up to `steps` times back to back, ignoring pacing and pause.
    /// Stops early when a step reports no elapsed time.
    pub fn run_steps(&mut self, steps: u64) -> Result<RunReport, SimError> {
        let _span = tracing::info_span!("run_steps", steps).entered();
        let mut report = RunReport::default();
        for _ in 0..steps {
            let dt = self.timed_step()?;
            if dt == 0.0 {
                report.exhausted = true;
                break;
            }
            report.steps += 1;
            report.elapsed += dt;
        }
        tracing::debug!(
            steps = report.steps,
            elapsed = report.elapsed,
            avg_step = ?self.timer.average_wall(),
            sim_rate = self.timer.sim_rate(),
            "batch complete"
        );
        Ok(report)
    }

    fn timed_step(&mut self) -> Result<f64, SimError> {
        let start = Instant::now();
        let dt = self.simulation.step(self.pacer.requested_dt())?;
        self.timer.record(start.elapsed(), dt);
        if dt != 0.0 {
            self.steps += 1;
        }
        tracing::trace!(step = self.steps, dt, time = self.simulation.simulation_time(), "tick");
        Ok(dt)
    }

    pub fn voxels(&self) -> &[Voxel] {
        self.simulation.voxels()
    }

    pub fn grid_size(&self) -> GridSize {
        self.simulation.grid_size()
    }

    pub fn simulation(&self) -> &dyn Simulation {
        self.simulation.as_ref()
    }

    /// Steps that advanced time since the last reset or swap.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated seconds per wall second over recent steps.
    pub fn sim_rate(&self) -> f64 {
        self.timer.sim_rate()
    }

    pub fn timer(&self) -> &StepTimer {
        &self.timer
    }

    pub fn pacer(&self) -> &StepPacer {
        &self.pacer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelsim_common::SimCoords;
    use voxelsim_kernel::{GameOfLife3D, LifeConfig, Maxwell};
    use voxelsim_persist::{Playback, Recorder};

    fn life(grid: GridSize) -> Box<dyn Simulation> {
        let config = LifeConfig {
            seed: Some(7),
            ..LifeConfig::default()
        };
        Box::new(GameOfLife3D::with_config(grid, config).unwrap())
    }

    #[test]
    fn tick_follows_the_pacer() {
        let mut driver = Driver::new(life(GridSize::new(3, 3, 3)), PacerConfig::default());

        assert_eq!(driver.tick(0.0).unwrap(), StepOutcome::Advanced(0.1));
        // Life reports step size 1.0, so the next step is due 0.5 s later.
        assert_eq!(driver.tick(0.2).unwrap(), StepOutcome::Waiting);
        assert_eq!(driver.tick(0.5).unwrap(), StepOutcome::Advanced(0.1));
        assert_eq!(driver.steps(), 2);
        assert!((driver.simulation().simulation_time() - 0.2).abs() < 1e-12);
        assert_eq!(driver.timer().count(), 2);
    }

    #[test]
    fn paused_driver_does_not_step() {
        let mut driver = Driver::new(life(GridSize::new(2, 2, 2)), PacerConfig::default());
        assert!(driver.toggle_pause());
        assert_eq!(driver.tick(10.0).unwrap(), StepOutcome::Paused);
        assert_eq!(driver.simulation().simulation_time(), 0.0);
        assert!(!driver.toggle_pause());
        assert!(matches!(driver.tick(10.0).unwrap(), StepOutcome::Advanced(_)));
    }

    #[test]
    fn reset_restarts_time_and_pacing() {
        let mut driver = Driver::new(life(GridSize::new(3, 3, 3)), PacerConfig::default());
        driver.run_steps(3).unwrap();
        driver.tick(100.0).unwrap();
        driver.reset().unwrap();
        assert_eq!(driver.simulation().simulation_time(), 0.0);
        assert_eq!(driver.steps(), 0);
        assert!(driver.pacer().due(0.0));
    }

    #[test]
    fn solver_dt_drives_time() {
        let solver = Maxwell::new(GridSize::new(4, 4, 4)).unwrap();
        let dt = solver.dt();
        let mut driver = Driver::new(Box::new(solver), PacerConfig::default());
        driver.trigger_source();
        let report = driver.run_steps(4).unwrap();
        assert_eq!(report.steps, 4);
        assert!((report.elapsed - 4.0 * dt).abs() < 1e-12);
        assert!(!report.exhausted);
        assert!((driver.timer().simulated_total() - report.elapsed).abs() < 1e-12);
        assert!(driver.sim_rate() >= 0.0);
    }

    #[test]
    fn timer_sees_each_step_dt() {
        let mut driver = Driver::new(life(GridSize::new(3, 3, 3)), PacerConfig::default());
        driver.run_steps(3).unwrap();
        assert_eq!(driver.timer().count(), 3);
        assert!((driver.timer().simulated_total() - 0.3).abs() < 1e-12);
        driver.reset().unwrap();
        assert_eq!(driver.timer().count(), 0);
        assert_eq!(driver.sim_rate(), 0.0);
    }

    #[test]
    fn swapping_simulations_changes_the_grid() {
        let mut driver = Driver::new(life(GridSize::new(2, 2, 2)), PacerConfig::default());
        driver.run_steps(2).unwrap();
        let old = driver.set_simulation(life(GridSize::new(4, 1, 3)));
        assert_eq!(old.grid_size(), GridSize::new(2, 2, 2));
        assert_eq!(driver.grid_size(), GridSize::new(4, 1, 3));
        assert_eq!(driver.voxels().len(), 12);
        assert_eq!(driver.voxels()[11].position, SimCoords::new(3, 0, 2));
        assert_eq!(driver.steps(), 0);
    }

    #[test]
    fn playback_reports_exhaustion() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.trace");
        let mut recorder = Recorder::create(life(GridSize::new(3, 3, 1)), &path).unwrap();
        recorder.record_steps(2, 0.1).unwrap();
        drop(recorder);

        let mut driver = Driver::new(Box::new(Playback::open(&path).unwrap()), PacerConfig::default());
        let report = driver.run_steps(10).unwrap();
        assert_eq!(report.steps, 2);
        assert!(report.exhausted);
        assert_eq!(driver.tick(1e6).unwrap(), StepOutcome::Exhausted);

        let err = driver.reset().unwrap_err();
        assert!(matches!(err, SimError::Unsupported { .. }));
    }
}
