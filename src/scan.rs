//! Directory scanning and filename filtering
//!
//! Lists candidate frames in a single directory (non-recursive). Only the
//! file extension is checked here: image data is never opened, so a scan
//! stays cheap enough for previews.

use std::path::Path;

use log::{debug, info, warn};

use crate::error::{Result, SheetError};
use crate::frame::ImageFrame;

/// Supported input image file extensions
pub const INPUT_EXTS: &[&str] = &["png", "jpg", "jpeg", "tga", "bmp", "tif", "tiff", "exr"];

/// Check if path has a supported input extension (case-insensitive)
pub fn is_input_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| INPUT_EXTS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Filename filter: substring or glob pattern
#[derive(Debug, Clone)]
pub enum FilenameFilter {
    All,
    Substring(String),
    Glob(glob::Pattern),
}

impl FilenameFilter {
    /// Empty -> match all; contains `*`, `?` or `[` -> glob; otherwise substring
    pub fn parse(filter: &str) -> Result<Self> {
        if filter.is_empty() {
            return Ok(FilenameFilter::All);
        }
        if filter.contains(['*', '?', '[']) {
            let pattern = glob::Pattern::new(filter)
                .map_err(|e| SheetError::InvalidJob(format!("Bad filter pattern {:?}: {}", filter, e)))?;
            return Ok(FilenameFilter::Glob(pattern));
        }
        Ok(FilenameFilter::Substring(filter.to_string()))
    }

    pub fn matches(&self, filename: &str) -> bool {
        match self {
            FilenameFilter::All => true,
            FilenameFilter::Substring(s) => filename.contains(s.as_str()),
            FilenameFilter::Glob(p) => p.matches(filename),
        }
    }
}

/// Scan `dir` for supported images whose filename passes `filter`
///
/// Returned frames are in directory order; sequencing is the manifest's job.
pub fn scan_directory(dir: &Path, filter: &str) -> Result<Vec<ImageFrame>> {
    if !dir.is_dir() {
        return Err(SheetError::DirectoryNotFound(dir.to_path_buf()));
    }
    let matcher = FilenameFilter::parse(filter)?;

    let entries = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SheetError::DirectoryNotFound(dir.to_path_buf())
        } else {
            SheetError::Io(e)
        }
    })?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !is_input_image(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping non UTF-8 filename: {}", path.display());
            continue;
        };
        if !matcher.matches(name) {
            debug!("Filtered out: {}", name);
            continue;
        }
        frames.push(ImageFrame::new(path));
    }

    if frames.is_empty() {
        return Err(SheetError::NoMatchingFiles {
            dir: dir.to_path_buf(),
            filter: filter.to_string(),
        });
    }

    info!("Scanned {}: {} matching files", dir.display(), frames.len());
    Ok(frames)
}
