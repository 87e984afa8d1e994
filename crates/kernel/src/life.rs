//! 3D Game of Life over the full 26-cell Moore neighborhood.
//!
//! Cell state lives in two generations. A step reads only the current
//! generation, writes the next one, then flips which buffer is current, so
//! the result never depends on the order cells are visited in.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use voxelsim_common::{Color, GridSize, SimCoords, Voxel};

use crate::simulation::{BaseState, SimError, Simulation, check_dt};

/// Color of a living cell.
pub const ALIVE: Color = [255, 255, 255, 100];
/// Color of a dead cell.
pub const DEAD: Color = [0, 0, 0, 100];

/// Automaton configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    /// Probability that a cell starts alive.
    pub alive_probability: f64,
    /// Seed for the starting pattern. A fresh seed is drawn when unset.
    pub seed: Option<u64>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            alive_probability: 0.5,
            seed: None,
        }
    }
}

/// Double-buffered 3D cellular automaton.
#[derive(Debug, Clone)]
pub struct GameOfLife3D {
    base: BaseState,
    generations: [Vec<u8>; 2],
    current: usize,
    config: LifeConfig,
    last_seed: Option<u64>,
    generation: u64,
}

impl GameOfLife3D {
    /// Automaton with a random start (probability 0.5, fresh seed).
    pub fn new(grid: GridSize) -> Result<Self, SimError> {
        Self::with_config(grid, LifeConfig::default())
    }

    /// Automaton with a random start drawn according to `config`.
    pub fn with_config(grid: GridSize, config: LifeConfig) -> Result<Self, SimError> {
        if !(0.0..=1.0).contains(&config.alive_probability) {
            return Err(SimError::InvalidConfig(format!(
                "alive_probability must be within [0, 1], got {}",
                config.alive_probability
            )));
        }
        let mut life = Self::allocate(grid, config)?;
        life.init_random_state()?;
        Ok(life)
    }

    /// Automaton with every cell dead. Useful for seeding fixed patterns.
    pub fn empty(grid: GridSize) -> Result<Self, SimError> {
        Self::allocate(grid, LifeConfig::default())
    }

    fn allocate(grid: GridSize, config: LifeConfig) -> Result<Self, SimError> {
        let base = BaseState::new(grid, DEAD)?;
        Ok(Self {
            base,
            generations: [grid.filled(0)?, grid.filled(0)?],
            current: 0,
            config,
            last_seed: None,
            generation: 0,
        })
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    /// Seed used by the most recent random initialization.
    pub fn seed(&self) -> Option<u64> {
        self.last_seed
    }

    /// Steps taken since the last initialization.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_alive(&self, coords: SimCoords) -> Result<bool, SimError> {
        let index = self.base.grid().index(coords)?;
        Ok(self.cells()[index] != 0)
    }

    /// Set one cell of the current generation and recolor its voxel.
    pub fn set_alive(&mut self, coords: SimCoords, alive: bool) -> Result<(), SimError> {
        let index = self.base.grid().index(coords)?;
        self.generations[self.current][index] = alive as u8;
        self.base.voxels_mut()[index].color = cell_color(alive);
        Ok(())
    }

    /// Kill every cell.
    pub fn clear(&mut self) {
        self.generations[self.current].fill(0);
        self.base.fill(DEAD);
    }

    /// Number of living cells in the current generation.
    pub fn live_count(&self) -> usize {
        self.cells().iter().filter(|&&c| c != 0).count()
    }

    /// Living cells among the in-bounds Moore neighbors of `coords`.
    pub fn live_neighbours(&self, coords: SimCoords) -> Result<u32, SimError> {
        let grid = self.base.grid();
        grid.index(coords)?;
        Ok(count_live_neighbours(grid, self.cells(), coords))
    }

    fn cells(&self) -> &[u8] {
        &self.generations[self.current]
    }

    fn refresh_colors(&mut self) {
        let cells = &self.generations[self.current];
        for (voxel, &cell) in self.base.voxels_mut().iter_mut().zip(cells) {
            voxel.color = cell_color(cell != 0);
        }
    }
}

impl Simulation for GameOfLife3D {
    fn name(&self) -> &'static str {
        "game-of-life-3d"
    }

    fn init_random_state(&mut self) -> Result<(), SimError> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let p = self.config.alive_probability;
        for cell in &mut self.generations[self.current] {
            *cell = rng.random_bool(p) as u8;
        }
        self.last_seed = Some(seed);
        self.generation = 0;
        self.base.reset_time();
        self.refresh_colors();
        tracing::info!(seed, grid = %self.base.grid(), live = self.live_count(), "life state initialized");
        Ok(())
    }

    fn step(&mut self, dt: f64) -> Result<f64, SimError> {
        let dt = check_dt(dt)?;
        let _span = tracing::debug_span!("life_step", generation = self.generation).entered();
        let grid = self.base.grid();
        let [first, second] = &mut self.generations;
        let (current, next) = if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        for (index, coords) in grid.coords().enumerate() {
            let neighbours = count_live_neighbours(grid, current, coords);
            next[index] = next_state(current[index] != 0, neighbours) as u8;
        }

        self.current ^= 1;
        self.generation += 1;
        self.refresh_colors();
        self.base.advance(dt);
        tracing::trace!(live = self.live_count(), "life step complete");
        Ok(dt)
    }

    fn grid_size(&self) -> GridSize {
        self.base.grid()
    }

    fn voxels(&self) -> &[Voxel] {
        self.base.voxels()
    }

    fn simulation_time(&self) -> f64 {
        self.base.simulation_time()
    }

    fn step_size(&self) -> f64 {
        self.base.step_size()
    }
}

/// Survival on 2 or 3 live neighbors, birth on exactly 3.
fn next_state(alive: bool, neighbours: u32) -> bool {
    matches!((alive, neighbours), (true, 2 | 3) | (false, 3))
}

fn count_live_neighbours(grid: GridSize, cells: &[u8], coords: SimCoords) -> u32 {
    grid.moore_neighbours(coords)
        .filter_map(|n| grid.index(n).ok())
        .map(|i| cells[i] as u32)
        .sum()
}

fn cell_color(alive: bool) -> Color {
    if alive { ALIVE } else { DEAD }
}
