//! Binary trace format.
//!
//! Layout, all little-endian:
//! ```text
//! header:  rows: u32 | cols: u32 | stacks: u32
//! record:  dt: f64   | rows*cols*stacks x [r, g, b, a]: u8
//! ```
//! Colors are written in voxel-array order (stack outer, row, col inner),
//! which is the grid index order. Writer and reader share this module so the
//! order cannot drift between them.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use voxelsim_common::{GridError, GridSize, Voxel};
use voxelsim_kernel::SimError;

/// Size of the header in bytes.
pub const HEADER_LEN: u64 = 12;

/// Exclusive upper bound for each header dimension.
pub const MAX_DIMENSION: u32 = 4096;

const DT_LEN: usize = 8;
const COLOR_LEN: usize = 4;

/// Errors from creating, opening or scanning a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot open trace {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("trace header is truncated: expected 12 bytes")]
    TruncatedHeader,
    #[error("trace grid {grid} exceeds the per-dimension limit of 4096")]
    GridTooLarge { grid: GridSize },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Result of reading one step-record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    /// A complete record; carries its dt. Colors are in the buffer.
    Record(f64),
    /// Clean end of stream, no bytes left.
    End,
    /// Stream ended part-way through a record after this many bytes.
    Truncated(usize),
}

/// Bytes in one step-record for `grid`.
pub fn record_len(grid: GridSize) -> usize {
    DT_LEN + grid.len() * COLOR_LEN
}

/// Zeroed scratch buffer for one record. Allocation failure is reported
/// instead of aborting.
pub fn record_buffer(grid: GridSize) -> Result<Vec<u8>, TraceError> {
    let too_large = GridError::TooLarge { grid };
    let len = grid
        .checked_len()?
        .checked_mul(COLOR_LEN)
        .and_then(|n| n.checked_add(DT_LEN))
        .ok_or_else(|| too_large.clone())?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| too_large)?;
    buf.resize(len, 0);
    Ok(buf)
}

pub fn write_header<W: Write>(writer: &mut W, grid: GridSize) -> io::Result<()> {
    for dim in grid.dims() {
        writer.write_all(&dim.to_le_bytes())?;
    }
    Ok(())
}

/// Read and validate the header.
pub fn read_header<R: Read>(reader: &mut R) -> Result<GridSize, TraceError> {
    let mut bytes = [0u8; HEADER_LEN as usize];
    reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TraceError::TruncatedHeader,
        _ => TraceError::Io(e),
    })?;
    let dim = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    let grid = GridSize::new(dim(0), dim(4), dim(8));
    if grid.dims().iter().any(|&d| d >= MAX_DIMENSION) {
        return Err(TraceError::GridTooLarge { grid });
    }
    Ok(grid)
}

/// Append one step-record: `dt` then every voxel's color in array order.
pub fn write_record<W: Write>(writer: &mut W, dt: f64, voxels: &[Voxel]) -> io::Result<()> {
    writer.write_all(&dt.to_le_bytes())?;
    for voxel in voxels {
        writer.write_all(&voxel.color)?;
    }
    Ok(())
}

/// Read one whole record into `buf`, which must be exactly
/// [`record_len`] bytes. Nothing outside `buf` is touched.
pub fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if filled == 0 {
        return Ok(ReadOutcome::End);
    }
    if filled < buf.len() {
        return Ok(ReadOutcome::Truncated(filled));
    }
    let mut dt = [0u8; DT_LEN];
    dt.copy_from_slice(&buf[..DT_LEN]);
    Ok(ReadOutcome::Record(f64::from_le_bytes(dt)))
}

/// Copy the colors of a complete record buffer onto `voxels`.
pub fn apply_colors(buf: &[u8], voxels: &mut [Voxel]) {
    for (voxel, color) in voxels.iter_mut().zip(buf[DT_LEN..].chunks_exact(COLOR_LEN)) {
        voxel.color.copy_from_slice(color);
    }
}

/// Overview of a trace file, produced without building voxels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummary {
    pub grid: GridSize,
    pub records: u64,
    pub total_time: f64,
    /// Bytes after the last complete record.
    pub trailing_bytes: usize,
    pub file_size: u64,
    /// SHA-256 of the whole file, hex encoded.
    pub sha256: String,
}

/// Scan a trace and summarize it.
pub fn inspect_trace(path: impl AsRef<Path>) -> Result<TraceSummary, TraceError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| TraceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let sha256 = format!("{:x}", Sha256::digest(&data));

    let mut reader = data.as_slice();
    let grid = read_header(&mut reader)?;
    let mut buf = record_buffer(grid)?;
    let mut records = 0;
    let mut total_time = 0.0;
    let mut trailing_bytes = 0;
    loop {
        match read_record(&mut reader, &mut buf)? {
            ReadOutcome::Record(dt) => {
                records += 1;
                total_time += dt;
            }
            ReadOutcome::End => break,
            ReadOutcome::Truncated(n) => {
                trailing_bytes = n;
                break;
            }
        }
    }

    tracing::debug!(path = %path.display(), records, trailing_bytes, "trace inspected");
    Ok(TraceSummary {
        grid,
        records,
        total_time,
        trailing_bytes,
        file_size: data.len() as u64,
        sha256,
    })
}
