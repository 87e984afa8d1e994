use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use voxelsim_common::{BLANK, GridSize, Voxel};
use voxelsim_kernel::{BaseState, SimError, Simulation};

use crate::trace::{self, ReadOutcome, TraceError};

/// Simulation that replays a recorded trace, one record per step.
///
/// Playback cannot be reset. Once the stream ends, or a record turns out to
/// be short or corrupt, every further step returns 0 and leaves the colors
/// as they were.
pub struct Playback {
    base: BaseState,
    reader: BufReader<File>,
    path: PathBuf,
    record: Vec<u8>,
    steps_played: u64,
    exhausted: bool,
}

impl Playback {
    /// Open a trace and read its header. Voxels start blank.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| TraceError::Open {
            path: path.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let grid = trace::read_header(&mut reader)?;
        let base = BaseState::new(grid, BLANK)?;
        tracing::info!(path = %path.display(), %grid, "playback opened");
        Ok(Self {
            base,
            reader,
            path,
            record: trace::record_buffer(grid)?,
            steps_played: 0,
            exhausted: false,
        })
    }

    /// Records applied so far.
    pub fn steps_played(&self) -> u64 {
        self.steps_played
    }

    /// True once the end of the trace (or a bad record) has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish(&mut self, reason: &str) -> f64 {
        if !self.exhausted {
            tracing::info!(steps = self.steps_played, reason, "playback exhausted");
            self.exhausted = true;
        }
        0.0
    }
}

impl Simulation for Playback {
    fn name(&self) -> &'static str {
        "playback"
    }

    fn init_random_state(&mut self) -> Result<(), SimError> {
        Err(SimError::Unsupported {
            operation: "init_random_state",
            simulation: "playback",
        })
    }

    /// The requested dt is ignored; the recorded one is returned.
    fn step(&mut self, _dt: f64) -> Result<f64, SimError> {
        if self.exhausted {
            return Ok(0.0);
        }
        let dt = match trace::read_record(&mut self.reader, &mut self.record) {
            Ok(ReadOutcome::Record(dt)) => dt,
            Ok(ReadOutcome::End) => return Ok(self.finish("end of trace")),
            Ok(ReadOutcome::Truncated(bytes)) => {
                tracing::warn!(bytes, "trailing partial record");
                return Ok(self.finish("truncated record"));
            }
            Err(e) => {
                tracing::warn!(error = %e, "trace read failed");
                return Ok(self.finish("read error"));
            }
        };
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(dt, "record carries an invalid dt");
            return Ok(self.finish("corrupt record"));
        }

        trace::apply_colors(&self.record, self.base.voxels_mut());
        self.base.advance(dt);
        if dt > 0.0 {
            self.base.set_step_size(dt);
        }
        self.steps_played += 1;
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

    /// Last non-zero recorded dt, or the default before any record.
    fn step_size(&self) -> f64 {
        self.base.step_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Recorder;
    use crate::trace::{write_header, write_record};
    use std::io::Write;
    use voxelsim_common::SimCoords;
    use voxelsim_kernel::{DEFAULT_STEP_SIZE, GameOfLife3D, LifeConfig, Maxwell};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn uniform(grid: GridSize, color: [u8; 4]) -> Vec<Voxel> {
        grid.coords().map(|c| Voxel::new(c, color)).collect()
    }

    fn write_trace(path: &Path, grid: GridSize, records: &[(f64, [u8; 4])]) {
        let mut file = File::create(path).unwrap();
        write_header(&mut file, grid).unwrap();
        for &(dt, color) in records {
            write_record(&mut file, dt, &uniform(grid, color)).unwrap();
        }
    }

    #[test]
    fn replays_records_then_returns_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("two.trace");
        let grid = GridSize::new(2, 2, 1);
        write_trace(&path, grid, &[(0.5, RED), (0.5, GREEN)]);

        let mut playback = Playback::open(&path).unwrap();
        assert_eq!(playback.grid_size(), grid);
        assert_eq!(playback.voxels().len(), 4);
        assert!(playback.voxels().iter().all(|v| v.color == BLANK));
        assert_eq!(playback.step_size(), DEFAULT_STEP_SIZE);

        assert_eq!(playback.step(99.0).unwrap(), 0.5);
        assert!(playback.voxels().iter().all(|v| v.color == RED));
        assert_eq!(playback.step(0.0).unwrap(), 0.5);
        assert!(playback.voxels().iter().all(|v| v.color == GREEN));
        assert_eq!(playback.simulation_time(), 1.0);
        assert_eq!(playback.step_size(), 0.5);

        assert_eq!(playback.step(0.5).unwrap(), 0.0);
        assert!(playback.voxels().iter().all(|v| v.color == GREEN));
        assert!(playback.is_exhausted());
        assert_eq!(playback.steps_played(), 2);
        assert_eq!(playback.simulation_time(), 1.0);
    }

    #[test]
    fn positions_follow_index_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pos.trace");
        let grid = GridSize::new(2, 3, 2);
        write_trace(&path, grid, &[]);

        let playback = Playback::open(&path).unwrap();
        for (i, voxel) in playback.voxels().iter().enumerate() {
            assert_eq!(grid.index(voxel.position).unwrap(), i);
        }
        assert_eq!(playback.voxels()[6].position, SimCoords::new(0, 0, 1));
    }

    #[test]
    fn reset_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("r.trace");
        write_trace(&path, GridSize::new(1, 1, 1), &[(1.0, RED)]);

        let mut playback = Playback::open(&path).unwrap();
        let err = playback.init_random_state().unwrap_err();
        assert!(matches!(err, SimError::Unsupported { .. }));
        // Still usable afterwards.
        assert_eq!(playback.step(1.0).unwrap(), 1.0);
    }

    #[test]
    fn truncated_record_leaves_colors_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cut.trace");
        let grid = GridSize::new(2, 2, 1);
        write_trace(&path, grid, &[(0.5, RED)]);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&0.5f64.to_le_bytes()).unwrap();
        file.write_all(&GREEN).unwrap();
        drop(file);

        let mut playback = Playback::open(&path).unwrap();
        assert_eq!(playback.step(1.0).unwrap(), 0.5);
        assert_eq!(playback.step(1.0).unwrap(), 0.0);
        assert!(playback.voxels().iter().all(|v| v.color == RED));
        assert!(playback.is_exhausted());
    }

    #[test]
    fn invalid_dt_is_treated_as_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nan.trace");
        write_trace(&path, GridSize::new(1, 1, 1), &[(0.5, RED), (f64::NAN, GREEN)]);

        let mut playback = Playback::open(&path).unwrap();
        assert_eq!(playback.step(1.0).unwrap(), 0.5);
        assert_eq!(playback.step(1.0).unwrap(), 0.0);
        assert_eq!(playback.voxels()[0].color, RED);
    }

    #[test]
    fn zero_dt_records_keep_previous_step_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("zero.trace");
        write_trace(&path, GridSize::new(1, 1, 1), &[(0.25, RED), (0.0, GREEN)]);

        let mut playback = Playback::open(&path).unwrap();
        playback.step(1.0).unwrap();
        assert_eq!(playback.step(1.0).unwrap(), 0.0);
        assert_eq!(playback.voxels()[0].color, GREEN);
        assert_eq!(playback.step_size(), 0.25);
        assert!(!playback.is_exhausted());
    }

    #[test]
    fn open_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.trace");
        assert!(matches!(Playback::open(&missing), Err(TraceError::Open { .. })));

        let short = tmp.path().join("short.trace");
        std::fs::write(&short, [1, 0, 0, 0]).unwrap();
        assert!(matches!(Playback::open(&short), Err(TraceError::TruncatedHeader)));

        let huge = tmp.path().join("huge.trace");
        write_trace(&huge, GridSize::new(4096, 1, 1), &[]);
        assert!(matches!(Playback::open(&huge), Err(TraceError::GridTooLarge { .. })));
    }

    #[test]
    fn unallocatable_grid_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vast.trace");
        let mut file = File::create(&path).unwrap();
        write_header(&mut file, GridSize::new(4095, 4095, 4095)).unwrap();
        drop(file);

        assert!(matches!(
            Playback::open(&path),
            Err(TraceError::Grid(voxelsim_common::GridError::TooLarge { .. }))
        ));
    }

    #[test]
    fn playback_reproduces_a_recorded_life_run() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("life.trace");
        let grid = GridSize::new(4, 4, 4);
        let config = LifeConfig {
            seed: Some(21),
            ..LifeConfig::default()
        };
        let mut recorder =
            Recorder::create(GameOfLife3D::with_config(grid, config).unwrap(), &path).unwrap();
        let mut frames = Vec::new();
        for _ in 0..5 {
            recorder.step(0.2).unwrap();
            frames.push(recorder.voxels().to_vec());
        }
        drop(recorder);

        let mut playback = Playback::open(&path).unwrap();
        for frame in &frames {
            assert_eq!(playback.step(1.0).unwrap(), 0.2);
            assert_eq!(playback.voxels(), frame.as_slice());
        }
        assert_eq!(playback.step(1.0).unwrap(), 0.0);
        assert_eq!(playback.voxels(), frames[4].as_slice());
    }

    #[test]
    fn playback_reports_solver_dt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fdtd.trace");
        let solver = Maxwell::new(GridSize::new(5, 5, 5)).unwrap();
        let dt = solver.dt();
        let mut recorder = Recorder::create(solver, &path).unwrap();
        recorder.record_steps(30, 1.0).unwrap();
        let last = recorder.voxels().to_vec();
        drop(recorder);

        let mut playback = Playback::open(&path).unwrap();
        let mut total = 0.0;
        for _ in 0..30 {
            total += playback.step(0.1).unwrap();
        }
        assert!((total - 30.0 * dt).abs() < 1e-9);
        assert_eq!(playback.step_size(), dt);
        assert_eq!(playback.voxels(), last.as_slice());
    }
}
