//! Grid layout planning
//!
//! Resolves `columns x rows` from a frame count and optional explicit
//! dimensions (0 = auto), then fixes the uniform cell size and padding that
//! determine the canvas.

use log::debug;
use serde::Serialize;

use crate::error::{Result, SheetError};

/// Resolve a grid shape able to hold `frame_count` cells
///
/// - both 0: near-square, `columns = ceil(sqrt(n))`, `rows = ceil(n / columns)`
/// - only columns: `rows = ceil(n / columns)`
/// - only rows: `columns = ceil(n / rows)`
/// - both set: used as-is, must hold all frames
pub fn resolve_grid(frame_count: usize, columns: u32, rows: u32) -> Result<(u32, u32)> {
    if frame_count == 0 {
        return Err(SheetError::EmptySequence);
    }
    let n = frame_count as u64;

    let (cols, rows) = match (columns, rows) {
        (0, 0) => {
            let cols = ceil_sqrt(n);
            (cols, n.div_ceil(cols))
        }
        (c, 0) => (c as u64, n.div_ceil(c as u64)),
        (0, r) => (n.div_ceil(r as u64), r as u64),
        (c, r) => {
            if (c as u64) * (r as u64) < n {
                return Err(SheetError::GridTooSmall {
                    columns: c,
                    rows: r,
                    frames: frame_count,
                });
            }
            (c as u64, r as u64)
        }
    };

    let cols = u32::try_from(cols).map_err(|_| SheetError::InvalidJob("Grid too large".into()))?;
    let rows = u32::try_from(rows).map_err(|_| SheetError::InvalidJob("Grid too large".into()))?;
    debug!("Grid for {} frames: {}x{}", frame_count, cols, rows);
    Ok((cols, rows))
}

/// Smallest `c` with `c * c >= n`
fn ceil_sqrt(n: u64) -> u64 {
    let mut c = (n as f64).sqrt().ceil() as u64;
    // Correct float rounding either way
    while c * c < n {
        c += 1;
    }
    while c > 1 && (c - 1) * (c - 1) >= n {
        c -= 1;
    }
    c.max(1)
}

/// Resolved sheet layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub padding: u32,
}

impl GridSpec {
    pub fn new(columns: u32, rows: u32, cell_width: u32, cell_height: u32, padding: u32) -> Self {
        Self {
            columns,
            rows,
            cell_width,
            cell_height,
            padding,
        }
    }

    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Canvas `(width, height)`: padding only between cells, never on the outer edge
    pub fn canvas_size(&self) -> (u32, u32) {
        let w = self.columns * self.cell_width + self.padding * self.columns.saturating_sub(1);
        let h = self.rows * self.cell_height + self.padding * self.rows.saturating_sub(1);
        (w, h)
    }

    /// Row-major `(row, col)` of linear cell index
    pub fn cell_position(&self, index: usize) -> (u32, u32) {
        let cols = self.columns as usize;
        ((index / cols) as u32, (index % cols) as u32)
    }

    /// Top-left pixel of cell `index`
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let (row, col) = self.cell_position(index);
        (
            col * (self.cell_width + self.padding),
            row * (self.cell_height + self.padding),
        )
    }
}
