use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use voxelsim_common::{GridSize, Voxel};
use voxelsim_kernel::{SimError, Simulation};

use crate::trace::{self, HEADER_LEN, TraceError};

/// Decorator that writes every step of the wrapped simulation to a trace
/// file while forwarding all calls unchanged.
///
/// The header is written on creation and rewritten by `init_random_state`,
/// which also drops any records from the previous run.
pub struct Recorder<S: Simulation = Box<dyn Simulation>> {
    inner: S,
    writer: BufWriter<File>,
    path: PathBuf,
    steps_recorded: u64,
}

impl<S: Simulation> Recorder<S> {
    /// Create (or truncate) the trace at `path` and write its header.
    pub fn create(inner: S, path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| TraceError::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        trace::write_header(&mut writer, inner.grid_size())?;
        writer.flush()?;
        tracing::info!(
            path = %path.display(),
            grid = %inner.grid_size(),
            simulation = inner.name(),
            "recording started"
        );
        Ok(Self {
            inner,
            writer,
            path,
            steps_recorded: 0,
        })
    }

    /// Step `steps` times with the same requested dt. Returns the total
    /// time that actually passed.
    pub fn record_steps(&mut self, steps: u64, dt: f64) -> Result<f64, SimError> {
        let mut total = 0.0;
        for _ in 0..steps {
            total += self.step(dt)?;
        }
        Ok(total)
    }

    /// Records written since creation or the last reset.
    pub fn steps_recorded(&self) -> u64 {
        self.steps_recorded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped simulation. Changes made here are only
    /// captured by the next recorded step.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Stop recording and hand back the wrapped simulation.
    pub fn into_inner(mut self) -> Result<S, SimError> {
        self.writer.flush()?;
        tracing::info!(path = %self.path.display(), steps = self.steps_recorded, "recording finished");
        Ok(self.inner)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.writer.seek(SeekFrom::Start(0))?;
        trace::write_header(&mut self.writer, self.inner.grid_size())?;
        self.writer.flush()?;
        self.writer.get_ref().set_len(HEADER_LEN)
    }
}

impl<S: Simulation> Simulation for Recorder<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn init_random_state(&mut self) -> Result<(), SimError> {
        self.inner.init_random_state()?;
        self.rewind()?;
        self.steps_recorded = 0;
        tracing::info!(path = %self.path.display(), "recording restarted");
        Ok(())
    }

    fn step(&mut self, dt: f64) -> Result<f64, SimError> {
        let actual = self.inner.step(dt)?;
        trace::write_record(&mut self.writer, actual, self.inner.voxels())?;
        self.writer.flush()?;
        self.steps_recorded += 1;
        tracing::trace!(step = self.steps_recorded, dt = actual, "record written");
        Ok(actual)
    }

    fn grid_size(&self) -> GridSize {
        self.inner.grid_size()
    }

    fn voxels(&self) -> &[Voxel] {
        self.inner.voxels()
    }

    fn simulation_time(&self) -> f64 {
        self.inner.simulation_time()
    }

    fn step_size(&self) -> f64 {
        self.inner.step_size()
    }

    fn trigger_source(&mut self) {
        self.inner.trigger_source()
    }
}
