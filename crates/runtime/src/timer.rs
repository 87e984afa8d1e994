use std::time::Duration;

/// Cost of one step: wall-clock time spent and simulation time gained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepSample {
    pub wall: Duration,
    pub simulated: f64,
}

/// Window of recent steps, used to report how fast simulated time moves
/// relative to real time.
///
/// Steps that gained no simulated time (an exhausted playback, say) still
/// count towards wall time, so a stalled run shows a falling rate.
#[derive(Debug)]
pub struct StepTimer {
    window: Vec<StepSample>,
    next: usize,
    len: usize,
}

impl StepTimer {
    /// Timer over the last `capacity` steps (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            window: vec![StepSample::default(); capacity.max(1)],
            next: 0,
            len: 0,
        }
    }

    pub fn record(&mut self, wall: Duration, simulated: f64) {
        self.window[self.next] = StepSample { wall, simulated };
        self.next = (self.next + 1) % self.window.len();
        self.len = (self.len + 1).min(self.window.len());
    }

    fn samples(&self) -> &[StepSample] {
        &self.window[..self.len]
    }

    /// Wall time spent in the window.
    pub fn wall_total(&self) -> Duration {
        self.samples().iter().map(|s| s.wall).sum()
    }

    /// Simulation time gained in the window.
    pub fn simulated_total(&self) -> f64 {
        self.samples().iter().map(|s| s.simulated).sum()
    }

    /// Simulated seconds per wall-clock second over the window; 0 until
    /// any measurable wall time has passed.
    pub fn sim_rate(&self) -> f64 {
        let wall = self.wall_total().as_secs_f64();
        if wall > 0.0 { self.simulated_total() / wall } else { 0.0 }
    }

    /// Mean wall time per step.
    pub fn average_wall(&self) -> Duration {
        match self.len {
            0 => Duration::ZERO,
            n => self.wall_total() / n as u32,
        }
    }

    /// Most expensive step in the window.
    pub fn slowest(&self) -> Option<StepSample> {
        self.samples().iter().copied().max_by_key(|s| s.wall)
    }

    pub fn count(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.next = 0;
        self.len = 0;
    }
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rate_is_simulated_over_wall_time() {
        let mut timer = StepTimer::new(4);
        timer.record(ms(200), 0.5);
        timer.record(ms(300), 0.5);

        assert_eq!(timer.count(), 2);
        assert_eq!(timer.wall_total(), ms(500));
        assert_eq!(timer.simulated_total(), 1.0);
        assert!((timer.sim_rate() - 2.0).abs() < 1e-12);
        assert_eq!(timer.average_wall(), ms(250));
        assert_eq!(timer.slowest().unwrap().wall, ms(300));
    }

    #[test]
    fn window_drops_oldest_steps() {
        let mut timer = StepTimer::new(2);
        timer.record(ms(1000), 100.0);
        timer.record(ms(100), 0.1);
        timer.record(ms(100), 0.1);

        assert_eq!(timer.count(), 2);
        assert!((timer.simulated_total() - 0.2).abs() < 1e-12);
        assert!((timer.sim_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_dt_steps_slow_the_rate() {
        let mut timer = StepTimer::new(8);
        timer.record(ms(100), 0.1);
        let before = timer.sim_rate();
        timer.record(ms(100), 0.0);
        assert!(timer.sim_rate() < before);
        assert_eq!(timer.count(), 2);
    }

    #[test]
    fn empty_and_cleared_report_zero() {
        let mut timer = StepTimer::new(0);
        assert_eq!(timer.sim_rate(), 0.0);
        assert_eq!(timer.average_wall(), Duration::ZERO);
        assert!(timer.slowest().is_none());
        // No measurable wall time yet.
        timer.record(Duration::ZERO, 1.0);
        assert_eq!(timer.sim_rate(), 0.0);
        assert_eq!(timer.count(), 1);
        timer.clear();
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.simulated_total(), 0.0);
    }
}
