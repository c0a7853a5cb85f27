//! Sprite sheet job: the complete, immutable configuration of one run
//!
//! Jobs serialize to JSON so they can be saved and replayed. Missing fields
//! take their defaults, so a job file only needs the values it changes.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::{OutputFormat, ResampleFilter};
use crate::error::{Result, SheetError};

/// Prefix marking an output path as relative to the project root
pub const ROOT_PREFIX: &str = "//";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteSheetJob {
    pub source_dir: PathBuf,
    /// Substring, or glob pattern if it contains `*`, `?` or `[`; empty = all
    pub filter: String,
    /// 0 = auto
    pub columns: u32,
    /// 0 = auto
    pub rows: u32,
    pub padding: u32,
    pub scale_percent: f64,
    pub reverse: bool,
    /// `None` = infer from output extension, PNG if there is none
    pub format: Option<OutputFormat>,
    pub output_path: PathBuf,
    /// Fill for padding/empty cells in formats without alpha
    pub background: [u8; 3],
    pub resample: ResampleFilter,
    /// Also write `<output>.json` with frame rectangles
    pub metadata: bool,
}

impl Default for SpriteSheetJob {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            filter: String::new(),
            columns: 0,
            rows: 0,
            padding: 0,
            scale_percent: 100.0,
            reverse: false,
            format: None,
            output_path: PathBuf::from("spritesheet.png"),
            background: [0, 0, 0],
            resample: ResampleFilter::Bilinear,
            metadata: false,
        }
    }
}

impl SpriteSheetJob {
    pub fn new(source_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    /// Load job from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let job: Self = serde_json::from_str(&text)
            .map_err(|e| SheetError::InvalidJob(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded job from {}", path.display());
        Ok(job)
    }

    /// Save job as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SheetError::write(parent, e))?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| SheetError::InvalidJob(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| SheetError::write(path, e))?;
        debug!("Saved job to {}", path.display());
        Ok(())
    }

    /// Check values the type system does not
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_percent.is_finite() && self.scale_percent > 0.0) {
            return Err(SheetError::InvalidJob(format!(
                "Scale must be a positive number, got {}",
                self.scale_percent
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(SheetError::InvalidJob("Output path is empty".into()));
        }
        self.resolved_format()?;
        Ok(())
    }

    /// Explicit format, else output extension, else PNG
    ///
    /// An explicit format must agree with a known output extension.
    /// Unknown extensions are left alone when the format is explicit.
    pub fn resolved_format(&self) -> Result<OutputFormat> {
        let from_ext = OutputFormat::from_path(&self.output_path);
        match (self.format, from_ext) {
            (Some(format), Some(Ok(ext))) if format != ext => Err(SheetError::InvalidJob(format!(
                "Format {} does not match output extension of {}",
                format,
                self.output_path.display()
            ))),
            (Some(format), _) => Ok(format),
            (None, Some(result)) => result,
            (None, None) => Ok(OutputFormat::Png),
        }
    }

    /// Final output location
    ///
    /// - `//name.png` resolves against `project_root`
    /// - other relative paths stay relative to the working directory
    /// - a path without extension gets the format's extension
    pub fn resolved_output_path(&self, project_root: &Path) -> Result<PathBuf> {
        let format = self.resolved_format()?;
        let raw = self.output_path.to_string_lossy();

        let mut path = match raw.strip_prefix(ROOT_PREFIX) {
            Some(rest) => project_root.join(rest),
            None => self.output_path.clone(),
        };
        if path.extension().is_none() {
            path.set_extension(format.extension());
        }
        Ok(path)
    }
}
