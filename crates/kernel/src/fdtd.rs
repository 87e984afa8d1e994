//! Finite-difference time-domain field solver.
//!
//! Illustrative, not validated. Units are normalized so that the vacuum
//! permittivity and permeability are 1 and E and H share units; waves travel
//! at `wave_speed / sqrt(eps_r * mu_r)`. Storage is collocated but the update
//! is Yee-staggered: curl E uses forward differences, curl H uses backward
//! differences, and neighbors outside the grid contribute zero.
//!
//! Axis mapping: x is col, y is row, z is stack.
//!
//! # Invariants
//! - `dt = courant * cell_spacing / wave_speed`, fixed at construction.
//! - Field arrays are indexed with the same grid index as the voxels.
//! - Divergence is not guarded against.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use voxelsim_common::{Color, GridSize, SimCoords, Voxel};

use crate::simulation::{BaseState, SimError, Simulation};

/// Edge handling applied to E after every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// First-order Mur absorbing condition using the previous step's values.
    Mur,
    /// Perfect electric conductor: E forced to zero on the outer shell.
    Pec,
}

/// Field component mapped to voxel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldComponent {
    Ex,
    Ey,
    Ez,
    Hx,
    Hy,
    Hz,
}

/// Relative material parameters of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub permittivity: f64,
    pub permeability: f64,
    pub conductivity: f64,
}

impl Medium {
    pub const VACUUM: Medium = Medium {
        permittivity: 1.0,
        permeability: 1.0,
        conductivity: 0.0,
    };
}

impl Default for Medium {
    fn default() -> Self {
        Self::VACUUM
    }
}

/// Axis-aligned box of cells, bounds inclusive, filled with `medium`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialRegion {
    pub min: SimCoords,
    pub max: SimCoords,
    pub medium: Medium,
}

impl MaterialRegion {
    pub fn contains(&self, c: SimCoords) -> bool {
        (self.min.row..=self.max.row).contains(&c.row)
            && (self.min.col..=self.max.col).contains(&c.col)
            && (self.min.stack..=self.max.stack).contains(&c.stack)
    }
}

/// Excitation injected into Ez at one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source cell. Grid center when unset.
    pub position: Option<SimCoords>,
    pub amplitude: f64,
    /// Carrier frequency, cycles per unit time.
    pub frequency: f64,
    /// Time at which the Gaussian envelope peaks.
    pub delay: f64,
    /// Envelope width (time for the envelope to fall to 1/e).
    pub width: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            position: None,
            amplitude: 1.0,
            frequency: 0.1,
            delay: 20.0,
            width: 6.0,
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FdtdConfig {
    pub cell_spacing: f64,
    pub wave_speed: f64,
    /// Courant number. Must stay at or below 1/sqrt(3) for stability.
    pub courant: f64,
    pub source: SourceConfig,
    /// Gain applied to the displayed component before clamping to [0, 1].
    pub amplification: f64,
    pub boundary: Boundary,
    pub display: FieldComponent,
    /// Later regions override earlier ones where they overlap.
    pub regions: Vec<MaterialRegion>,
}

impl Default for FdtdConfig {
    fn default() -> Self {
        Self {
            cell_spacing: 1.0,
            wave_speed: 1.0,
            courant: 0.5,
            source: SourceConfig::default(),
            amplification: 4.0,
            boundary: Boundary::Mur,
            display: FieldComponent::Ez,
            regions: Vec::new(),
        }
    }
}

impl FdtdConfig {
    fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("cell_spacing", self.cell_spacing),
            ("wave_speed", self.wave_speed),
            ("courant", self.courant),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        for region in &self.regions {
            let m = region.medium;
            if !(m.permittivity > 0.0 && m.permeability > 0.0 && m.conductivity >= 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "region {}..{} has a non-physical medium {m:?}",
                    region.min, region.max
                )));
            }
        }
        if self.courant > 1.0 / 3f64.sqrt() {
            tracing::warn!(
                courant = self.courant,
                "courant number above 1/sqrt(3); the solver will diverge"
            );
        }
        Ok(())
    }
}

/// One E component tangential to exactly one face, paired with the same
/// component one cell inward along that face's normal.
#[derive(Debug, Clone, Copy)]
struct MurTap {
    cell: usize,
    inner: usize,
    component: usize,
}

/// Outer-shell bookkeeping, computed once per grid.
///
/// Storage is Yee-staggered by index: the x component at index `i` sits at
/// `i + 1/2` along x, and likewise for y and z. So on a face with normal
/// axis `a`, only the two components other than `a` lie on the face. On a
/// high face the normal E component and the two tangential H components sit
/// half a cell outside the grid; nothing inside reads them, so they are
/// cleared rather than left to be driven by the edge.
///
/// Axes thinner than 3 cells have no interior and are treated as open, so a
/// flat grid behaves as a 2D slice rather than being all boundary.
#[derive(Debug, Clone, Default)]
struct Shell {
    /// Every cell on at least one face.
    cells: Vec<usize>,
    /// Components tangential to exactly one face.
    taps: Vec<MurTap>,
    /// (cell, component) tangential to two or more faces: box edges and corners.
    creases: Vec<(usize, usize)>,
    /// E components half a cell beyond a high face.
    outer_e: Vec<(usize, usize)>,
    /// H components half a cell beyond a high face.
    outer_h: Vec<(usize, usize)>,
}

impl Shell {
    fn new(grid: GridSize) -> Self {
        let strides = strides(grid);
        let dims = [grid.cols, grid.rows, grid.stacks];
        let mut shell = Shell::default();
        for (i, c) in grid.coords().enumerate() {
            let pos = [c.col, c.row, c.stack];
            // Per normal axis: inward neighbour, and whether the face is the high one.
            let mut faces: [Option<(usize, bool)>; 3] = [None; 3];
            for axis in 0..3 {
                if dims[axis] < 3 {
                    continue;
                }
                if pos[axis] == 0 {
                    faces[axis] = Some((i + strides[axis], false));
                } else if pos[axis] == dims[axis] as i32 - 1 {
                    faces[axis] = Some((i - strides[axis], true));
                }
            }
            if faces.iter().all(Option::is_none) {
                continue;
            }
            shell.cells.push(i);
            for component in 0..3 {
                let mut tangential = faces
                    .iter()
                    .enumerate()
                    .filter(|&(axis, _)| axis != component)
                    .filter_map(|(_, face)| *face);
                match (tangential.next(), tangential.next()) {
                    (Some((inner, _)), None) => shell.taps.push(MurTap {
                        cell: i,
                        inner,
                        component,
                    }),
                    (Some(_), Some(_)) => shell.creases.push((i, component)),
                    _ => {}
                }
            }
            for (axis, face) in faces.iter().enumerate() {
                if let Some((_, true)) = face {
                    shell.outer_e.push((i, axis));
                    for component in (0..3).filter(|&c| c != axis) {
                        shell.outer_h.push((i, component));
                    }
                }
            }
        }
        shell
    }
}

/// Leapfrog E/H solver on the voxel grid.
#[derive(Debug, Clone)]
pub struct Maxwell {
    base: BaseState,
    config: FdtdConfig,
    dt: f64,
    e: Vec<DVec3>,
    h: Vec<DVec3>,
    e_prev: Vec<DVec3>,
    /// E update: `e = ca * e + cb * curl(h)`.
    ca: Vec<f64>,
    cb: Vec<f64>,
    /// H update: `h -= ch * curl(e)`.
    ch: Vec<f64>,
    permittivity: Vec<f64>,
    permeability: Vec<f64>,
    shell: Shell,
    mur_scratch: Vec<f64>,
    source_index: Option<usize>,
    source_on: bool,
}

impl Maxwell {
    pub fn new(grid: GridSize) -> Result<Self, SimError> {
        Self::with_config(grid, FdtdConfig::default())
    }

    pub fn with_config(grid: GridSize, config: FdtdConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut base = BaseState::new(grid, field_color(0.0))?;
        let dt = config.courant * config.cell_spacing / config.wave_speed;
        base.set_step_size(dt);

        let source_index = match config.source.position {
            Some(position) => Some(grid.index(position)?),
            None if grid.is_empty() => None,
            None => Some(grid.index(SimCoords::new(
                (grid.rows / 2) as i32,
                (grid.cols / 2) as i32,
                (grid.stacks / 2) as i32,
            ))?),
        };

        let mut ca = grid.filled(1.0)?;
        let mut cb = grid.filled(0.0)?;
        let mut ch = grid.filled(0.0)?;
        let mut permittivity = grid.filled(1.0)?;
        let mut permeability = grid.filled(1.0)?;
        let c_dt_dx = config.wave_speed * dt / config.cell_spacing;
        for (i, coords) in grid.coords().enumerate() {
            let medium = config
                .regions
                .iter()
                .rev()
                .find(|r| r.contains(coords))
                .map_or(Medium::VACUUM, |r| r.medium);
            let loss = medium.conductivity * dt / (2.0 * medium.permittivity);
            ca[i] = (1.0 - loss) / (1.0 + loss);
            cb[i] = c_dt_dx / medium.permittivity / (1.0 + loss);
            ch[i] = c_dt_dx / medium.permeability;
            permittivity[i] = medium.permittivity;
            permeability[i] = medium.permeability;
        }

        let shell = Shell::new(grid);
        tracing::info!(
            grid = %grid,
            dt,
            boundary = ?config.boundary,
            shell_cells = shell.cells.len(),
            "fdtd solver constructed"
        );

        Ok(Self {
            base,
            dt,
            e: grid.filled(DVec3::ZERO)?,
            h: grid.filled(DVec3::ZERO)?,
            e_prev: grid.filled(DVec3::ZERO)?,
            ca,
            cb,
            ch,
            permittivity,
            permeability,
            mur_scratch: vec![0.0; shell.taps.len()],
            shell,
            source_index,
            source_on: false,
            config,
        })
    }

    pub fn config(&self) -> &FdtdConfig {
        &self.config
    }

    /// Solver time step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Whether the continuous-wave source is switched on.
    pub fn source_active(&self) -> bool {
        self.source_on
    }

    pub fn electric(&self, coords: SimCoords) -> Result<DVec3, SimError> {
        Ok(self.e[self.base.grid().index(coords)?])
    }

    pub fn magnetic(&self, coords: SimCoords) -> Result<DVec3, SimError> {
        Ok(self.h[self.base.grid().index(coords)?])
    }

    /// Electromagnetic energy summed over all cells,
    /// `(eps * |E|^2 + mu * |H|^2) / 2` per cell.
    pub fn field_energy(&self) -> f64 {
        self.e
            .iter()
            .zip(&self.h)
            .zip(self.permittivity.iter().zip(&self.permeability))
            .map(|((e, h), (eps, mu))| 0.5 * (eps * e.length_squared() + mu * h.length_squared()))
            .sum()
    }

    /// Source term injected at time `t`.
    pub fn source_value(&self, t: f64) -> f64 {
        let s = &self.config.source;
        let carrier = (2.0 * PI * s.frequency * t).sin();
        if self.source_on {
            s.amplitude * carrier
        } else {
            let envelope = (-((t - s.delay) / s.width).powi(2)).exp();
            s.amplitude * carrier * envelope
        }
    }

    fn inject_source(&mut self) {
        if let Some(index) = self.source_index {
            self.e[index].z += self.source_value(self.base.simulation_time());
        }
    }

    fn update_h(&mut self) {
        let grid = self.base.grid();
        let strides = strides(grid);
        for (i, c) in grid.coords().enumerate() {
            let center = self.e[i];
            let fwd = |inside: bool, stride: usize| {
                if inside { self.e[i + stride] - center } else { -center }
            };
            let dx = fwd(c.col + 1 < grid.cols as i32, strides[0]);
            let dy = fwd(c.row + 1 < grid.rows as i32, strides[1]);
            let dz = fwd(c.stack + 1 < grid.stacks as i32, strides[2]);
            self.h[i] -= self.ch[i] * curl(dx, dy, dz);
        }
    }

    fn update_e(&mut self) {
        let grid = self.base.grid();
        let strides = strides(grid);
        self.e_prev.copy_from_slice(&self.e);
        for (i, c) in grid.coords().enumerate() {
            let center = self.h[i];
            let bwd = |inside: bool, stride: usize| {
                if inside { center - self.h[i - stride] } else { center }
            };
            let dx = bwd(c.col > 0, strides[0]);
            let dy = bwd(c.row > 0, strides[1]);
            let dz = bwd(c.stack > 0, strides[2]);
            self.e[i] = self.ca[i] * self.e[i] + self.cb[i] * curl(dx, dy, dz);
        }
    }

    fn apply_boundary(&mut self) {
        match self.config.boundary {
            Boundary::Pec => {
                for &cell in &self.shell.cells {
                    self.e[cell] = DVec3::ZERO;
                }
            }
            Boundary::Mur => {
                let k = (self.config.courant - 1.0) / (self.config.courant + 1.0);
                // All taps read before any is written.
                for (out, tap) in self.mur_scratch.iter_mut().zip(&self.shell.taps) {
                    let c = tap.component;
                    *out = self.e_prev[tap.inner][c]
                        + k * (self.e[tap.inner][c] - self.e_prev[tap.cell][c]);
                }
                for (&value, tap) in self.mur_scratch.iter().zip(&self.shell.taps) {
                    self.e[tap.cell][tap.component] = value;
                }
                for &(cell, c) in &self.shell.creases {
                    self.e[cell][c] = 0.0;
                }
                for &(cell, c) in &self.shell.outer_e {
                    self.e[cell][c] = 0.0;
                }
                for &(cell, c) in &self.shell.outer_h {
                    self.h[cell][c] = 0.0;
                }
            }
        }
    }

    fn refresh_colors(&mut self) {
        let amplification = self.config.amplification;
        let display = self.config.display;
        for (i, voxel) in self.base.voxels_mut().iter_mut().enumerate() {
            let value = match display {
                FieldComponent::Ex => self.e[i].x,
                FieldComponent::Ey => self.e[i].y,
                FieldComponent::Ez => self.e[i].z,
                FieldComponent::Hx => self.h[i].x,
                FieldComponent::Hy => self.h[i].y,
                FieldComponent::Hz => self.h[i].z,
            };
            voxel.color = field_color(amplification * value);
        }
    }
}

impl Simulation for Maxwell {
    fn name(&self) -> &'static str {
        "fdtd"
    }

    fn init_random_state(&mut self) -> Result<(), SimError> {
        self.e.fill(DVec3::ZERO);
        self.h.fill(DVec3::ZERO);
        self.e_prev.fill(DVec3::ZERO);
        self.source_on = false;
        self.base.reset_time();
        self.refresh_colors();
        tracing::info!(grid = %self.base.grid(), "fdtd fields reset");
        Ok(())
    }

    fn step(&mut self, requested_dt: f64) -> Result<f64, SimError> {
        let _span = tracing::debug_span!("fdtd_step", t = self.base.simulation_time()).entered();
        self.inject_source();
        self.update_h();
        self.update_e();
        self.apply_boundary();
        self.refresh_colors();
        self.base.advance(self.dt);
        tracing::trace!(requested_dt, actual_dt = self.dt, "fdtd step complete");
        Ok(self.dt)
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

    fn trigger_source(&mut self) {
        self.source_on = !self.source_on;
        tracing::info!(on = self.source_on, "fdtd source toggled");
    }
}

/// Map an amplified field value to a color: red and alpha grow with
/// intensity, green falls, blue stays 0.
pub fn field_color(amplified: f64) -> Color {
    let intensity = amplified.abs().clamp(0.0, 1.0);
    let level = |x: f64| (255.0 * x).round() as u8;
    [level(intensity), level(1.0 - intensity), 0, level(intensity)]
}

fn curl(dx: DVec3, dy: DVec3, dz: DVec3) -> DVec3 {
    DVec3::new(dy.z - dz.y, dz.x - dx.z, dx.y - dy.x)
}

/// Index strides for (col, row, stack).
fn strides(grid: GridSize) -> [usize; 3] {
    let cols = grid.cols as usize;
    [1, cols, cols * grid.rows as usize]
}
