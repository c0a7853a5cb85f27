//! SEQSHEET - image sequence to sprite sheet packer
//!
//! scan -> natural sort -> probe -> grid layout -> composite -> encode.
//!
//! ```ignore
//! use seqsheet::{Pipeline, SpriteSheetJob, progress::NoProgress};
//!
//! let mut job = SpriteSheetJob::new("renders/walk", "sheets/walk.png");
//! job.filter = "walk_".into();
//! job.padding = 2;
//! let report = Pipeline::new().run(&job, &NoProgress)?;
//! println!("{}x{} grid", report.grid.columns, report.grid.rows);
//! ```

// Pipeline stages
pub mod scan;
pub mod natural;
pub mod frame;
pub mod grid;
pub mod compositor;
pub mod encode;
pub mod pipeline;

// Backend, configuration, reporting
pub mod codec;
pub mod error;
pub mod job;
pub mod progress;

// App modules
pub mod cli;
pub mod paths;

pub use codec::{ImageCodec, ImageCrateCodec, OutputFormat, ResampleFilter};
pub use error::{Result, SheetError};
pub use frame::{ImageFrame, SequenceManifest};
pub use grid::GridSpec;
pub use job::SpriteSheetJob;
pub use pipeline::{Pipeline, ScanReport, SheetReport};
