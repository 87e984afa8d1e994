//! Persistence: the binary trace format, a recording decorator and
//! trace-driven playback.
//!
//! # Invariants
//! - A trace is a 12-byte header followed by zero or more whole records.
//! - Record colors are in voxel-array order, the same order playback
//!   assigns positions in.
//! - Recording never changes what the wrapped simulation reports.
//! - Playback never alters colors on a step that returns 0 at end of trace.

pub mod playback;
pub mod recorder;
pub mod trace;

pub use playback::Playback;
pub use recorder::Recorder;
pub use trace::{HEADER_LEN, MAX_DIMENSION, TraceError, TraceSummary, inspect_trace};

pub fn crate_info() -> &'static str {
    "voxelsim-persist v0.1.0"
}
