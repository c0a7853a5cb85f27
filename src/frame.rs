//! Source frames and the ordered sequence they form
//!
//! `ImageFrame` is created by the scanner with only its path and sort key.
//! Dimensions are attached later by the compositor's probe pass via
//! `with_dimensions`, which returns a new value.
//!
//! `SequenceManifest` always holds frames in natural order (or that order
//! reversed as a whole). Construction sorts and drops duplicate paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::natural::SortKey;

/// One source image on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    path: PathBuf,
    raw_filename: String,
    dimensions: Option<(u32, u32)>,
    sort_key: SortKey,
}

impl ImageFrame {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sort_key = SortKey::new(&raw_filename);
        Self {
            path,
            raw_filename,
            dimensions: None,
            sort_key,
        }
    }

    /// Same frame with known pixel size
    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        Self {
            dimensions: Some((width, height)),
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw_filename(&self) -> &str {
        &self.raw_filename
    }

    pub fn sort_key(&self) -> &SortKey {
        &self.sort_key
    }

    /// `(width, height)` once probed
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|(_, h)| h)
    }
}

/// Ordered, duplicate-free frame list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceManifest {
    frames: Vec<ImageFrame>,
    reversed: bool,
}

impl SequenceManifest {
    /// Sort frames naturally by filename and drop repeated paths
    pub fn from_frames(frames: Vec<ImageFrame>) -> Self {
        let mut seen = HashSet::new();
        let mut frames: Vec<ImageFrame> = frames
            .into_iter()
            .filter(|f| seen.insert(f.path.clone()))
            .collect();
        // Stable sort: equal keys (same filename in different dirs) keep scan order
        frames.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
        Self { frames, reversed: false }
    }

    /// Whole sequence in reverse order
    pub fn reversed(mut self) -> Self {
        self.frames.reverse();
        self.reversed = !self.reversed;
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ImageFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageFrame> {
        self.frames.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }

    /// Swap in probed copies of the same frames, same order
    pub(crate) fn replace_frames(self, frames: Vec<ImageFrame>) -> Self {
        debug_assert_eq!(frames.len(), self.frames.len());
        debug_assert!(frames.iter().zip(&self.frames).all(|(a, b)| a.path == b.path));
        Self { frames, reversed: self.reversed }
    }
}

impl<'a> IntoIterator for &'a SequenceManifest {
    type Item = &'a ImageFrame;
    type IntoIter = std::slice::Iter<'a, ImageFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
