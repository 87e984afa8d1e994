use serde::{Deserialize, Serialize};

/// How wall-clock time maps onto simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Wall-clock seconds per unit of simulation step size.
    pub time_scale: f64,
    /// dt passed to every `step` call.
    pub requested_dt: f64,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            time_scale: 0.5,
            requested_dt: 0.1,
        }
    }
}

/// Decides when the next step is due.
///
/// A step is due once wall-clock time reaches `next_due`; after each step the
/// deadline moves to `now + step_size * time_scale`.
#[derive(Debug, Clone)]
pub struct StepPacer {
    config: PacerConfig,
    next_due: f64,
}

impl StepPacer {
    pub fn new(config: PacerConfig) -> Self {
        Self {
            config,
            next_due: 0.0,
        }
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    pub fn requested_dt(&self) -> f64 {
        self.config.requested_dt
    }

    pub fn next_due(&self) -> f64 {
        self.next_due
    }

    /// True when a step should run at wall-clock `now` (seconds).
    pub fn due(&self, now: f64) -> bool {
        now >= self.next_due
    }

    /// Push the deadline out after a step taken at `now`.
    pub fn schedule(&mut self, now: f64, step_size: f64) {
        self.next_due = now + step_size * self.config.time_scale;
    }

    /// Make the next step due immediately.
    pub fn reset(&mut self) {
        self.next_due = 0.0;
    }
}

impl Default for StepPacer {
    fn default() -> Self {
        Self::new(PacerConfig::default())
    }
}
