//! Sheet generation errors
//!
//! Every stage (scan, plan, composite, encode) reports failure through
//! `SheetError`. Nothing is recovered locally: the caller decides how to
//! present it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building a sprite sheet
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Source directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No matching image files in {} (filter: {filter:?})", .dir.display())]
    NoMatchingFiles { dir: PathBuf, filter: String },

    #[error("Sequence is empty")]
    EmptySequence,

    #[error("Grid {columns}x{rows} is too small for {frames} frames")]
    GridTooSmall { columns: u32, rows: u32, frames: usize },

    #[error("Failed to decode frame {}: {reason}", .path.display())]
    FrameDecodeFailed { path: PathBuf, reason: String },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to write {}: {reason}", .path.display())]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Worker pool error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SheetError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SheetError::FrameDecodeFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SheetError::WriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_too_small_message() {
        let err = SheetError::GridTooSmall { columns: 2, rows: 2, frames: 10 };
        assert_eq!(err.to_string(), "Grid 2x2 is too small for 10 frames");
    }

    #[test]
    fn test_decode_names_path() {
        let err = SheetError::decode("/tmp/walk_003.png", "bad crc");
        let msg = err.to_string();
        assert!(msg.contains("walk_003.png"));
        assert!(msg.contains("bad crc"));
    }
}
