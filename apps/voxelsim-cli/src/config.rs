use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use voxelsim_common::GridSize;
use voxelsim_kernel::{FdtdConfig, LifeConfig};
use voxelsim_runtime::PacerConfig;

/// Built-in simulations selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SimKind {
    #[default]
    Life,
    Fdtd,
}

/// Run file contents. Every field is optional in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulation: SimKind,
    pub grid: GridSize,
    pub steps: u64,
    pub life: LifeConfig,
    pub fdtd: FdtdConfig,
    pub pacer: PacerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation: SimKind::default(),
            grid: GridSize::new(16, 16, 16),
            steps: 100,
            life: LifeConfig::default(),
            fdtd: FdtdConfig::default(),
            pacer: PacerConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Command-line values take precedence over the run file.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(sim) = overrides.simulation {
            self.simulation = sim;
        }
        if let Some(rows) = overrides.rows {
            self.grid.rows = rows;
        }
        if let Some(cols) = overrides.cols {
            self.grid.cols = cols;
        }
        if let Some(stacks) = overrides.stacks {
            self.grid.stacks = stacks;
        }
        if let Some(steps) = overrides.steps {
            self.steps = steps;
        }
        if let Some(dt) = overrides.dt {
            self.pacer.requested_dt = dt;
        }
        if let Some(seed) = overrides.seed {
            self.life.seed = Some(seed);
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub simulation: Option<SimKind>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub stacks: Option<u32>,
    pub steps: Option<u64>,
    pub dt: Option<f64>,
    pub seed: Option<u64>,
}
