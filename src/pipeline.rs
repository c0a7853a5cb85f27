//! Sheet pipeline: scan -> sort -> probe -> layout -> composite -> encode
//!
//! `Pipeline` owns the codec backend and execution settings; the job is
//! passed in per call. Any error aborts the run before or during encoding,
//! and in both cases no output file is left on disk.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::codec::{ImageCodec, ImageCrateCodec, OutputFormat};
use crate::compositor::Compositor;
use crate::encode::encode_canvas;
use crate::error::{Result, SheetError};
use crate::frame::SequenceManifest;
use crate::grid::GridSpec;
use crate::job::SpriteSheetJob;
use crate::progress::{ProgressSink, SheetStage};
use crate::scan::scan_directory;

/// Result of a scan-only query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub frame_count: usize,
    /// Filtered files in natural order (reversed if the job says so)
    pub files: Vec<PathBuf>,
}

/// Placement of one frame in the sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRect {
    pub index: usize,
    pub name: String,
    pub source: PathBuf,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Summary of a finished sheet; also the metadata sidecar layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetReport {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub grid: GridSpec,
    pub scale_percent: f64,
    pub reversed: bool,
    pub frames: Vec<FrameRect>,
}

impl SheetReport {
    /// `<output>.json` next to the sheet
    pub fn metadata_path(&self) -> PathBuf {
        let mut name = self.output.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

/// Sprite sheet generator
pub struct Pipeline<C: ImageCodec = ImageCrateCodec> {
    codec: C,
    threads: usize,
    project_root: PathBuf,
}

impl Pipeline<ImageCrateCodec> {
    pub fn new() -> Self {
        Self::with_codec(ImageCrateCodec)
    }
}

impl Default for Pipeline<ImageCrateCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ImageCodec> Pipeline<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            threads: 0,
            project_root: PathBuf::from("."),
        }
    }

    /// Worker threads for decode (0 = auto)
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Base for `//`-prefixed output paths
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn manifest(&self, job: &SpriteSheetJob) -> Result<SequenceManifest> {
        let frames = scan_directory(&job.source_dir, &job.filter)?;
        Ok(SequenceManifest::from_frames(frames))
    }

    /// Count and list matching frames without compositing
    pub fn scan(&self, job: &SpriteSheetJob) -> Result<ScanReport> {
        let manifest = self.manifest(job)?;
        let manifest = if job.reverse { manifest.reversed() } else { manifest };
        Ok(ScanReport {
            frame_count: manifest.len(),
            files: manifest.paths(),
        })
    }

    /// Build the sheet and write it (plus metadata, if requested)
    pub fn run(&self, job: &SpriteSheetJob, progress: &dyn ProgressSink) -> Result<SheetReport> {
        job.validate()?;
        let format = job.resolved_format()?;
        let output = job.resolved_output_path(&self.project_root)?;

        progress.on_stage(SheetStage::Scanning, 0);
        let manifest = self.manifest(job)?;
        if manifest.is_empty() {
            return Err(SheetError::EmptySequence);
        }
        let total = manifest.len();

        let compositor = Compositor::new(&self.codec, job.scale_percent, job.resample, job.reverse, self.threads)?;

        progress.on_stage(SheetStage::Probing, total);
        let manifest = compositor.prepare(manifest)?;
        let grid = compositor.layout(&manifest, job.columns, job.rows, job.padding)?;
        let canvas = compositor.composite(&manifest, &grid, progress)?;

        if progress.is_cancelled() {
            return Err(SheetError::Cancelled);
        }

        let (width, height) = (canvas.width(), canvas.height());
        let frames = manifest
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                let (x, y) = grid.cell_origin(index);
                let (w, h) = frame
                    .dimensions()
                    .map(|(w, h)| crate::compositor::scaled_size(w, h, job.scale_percent))
                    .unwrap_or((grid.cell_width, grid.cell_height));
                FrameRect {
                    index,
                    name: frame.raw_filename().to_string(),
                    source: frame.path().to_path_buf(),
                    x,
                    y,
                    width: w,
                    height: h,
                }
            })
            .collect();

        progress.on_stage(SheetStage::Encoding, total);
        encode_canvas(&self.codec, canvas, format, &output, job.background)?;

        let report = SheetReport {
            output,
            format,
            width,
            height,
            grid,
            scale_percent: job.scale_percent,
            reversed: manifest.is_reversed(),
            frames,
        };

        if job.metadata {
            if let Err(e) = write_metadata(&report) {
                // No partial results: drop the sheet too
                remove_quietly(&report.output);
                remove_quietly(&report.metadata_path());
                return Err(e);
            }
        }

        progress.on_stage(SheetStage::Complete, total);
        info!(
            "Sprite sheet done: {} frames, {}x{} grid, {}x{} px -> {}",
            total,
            grid.columns,
            grid.rows,
            width,
            height,
            report.output.display()
        );
        Ok(report)
    }
}

fn write_metadata(report: &SheetReport) -> Result<()> {
    let path = report.metadata_path();
    let text = serde_json::to_string_pretty(report).map_err(|e| SheetError::write(&path, e))?;
    std::fs::write(&path, text).map_err(|e| SheetError::write(&path, e))?;
    info!("Wrote metadata: {}", path.display());
    Ok(())
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelProgress, NoProgress};
    use image::{Rgba, RgbaImage};

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32, px: [u8; 4]) {
        RgbaImage::from_pixel(w, h, Rgba(px)).save(dir.join(name)).unwrap();
    }

    /// frame1..frame{n}.png, 8x8, red channel = frame number
    fn numbered_sequence(dir: &Path, n: u8) {
        for i in 1..=n {
            write_frame(dir, &format!("frame{}.png", i), 8, 8, [i, 0, 0, 255]);
        }
    }

    #[test]
    fn test_scan_only_lists_natural_order() {
        let tmp = tempfile::tempdir().unwrap();
        numbered_sequence(tmp.path(), 11);

        let job = SpriteSheetJob::new(tmp.path(), tmp.path().join("out.png"));
        let report = Pipeline::new().scan(&job).unwrap();
        assert_eq!(report.frame_count, 11);

        let names: Vec<String> = report
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (1..=11).map(|i| format!("frame{}.png", i)).collect();
        assert_eq!(names, expected);
        assert!(!tmp.path().join("out.png").exists());
    }

    #[test]
    fn test_full_run_png() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("frames");
        std::fs::create_dir(&src).unwrap();
        numbered_sequence(&src, 10);

        let mut job = SpriteSheetJob::new(&src, tmp.path().join("out/sheet.png"));
        job.columns = 3;
        job.padding = 2;
        job.metadata = true;

        let report = Pipeline::new().threads(2).run(&job, &NoProgress).unwrap();
        assert_eq!((report.grid.columns, report.grid.rows), (3, 4));
        assert_eq!((report.width, report.height), (3 * 8 + 2 * 2, 4 * 8 + 3 * 2));
        assert_eq!(report.frames.len(), 10);
        assert_eq!(report.frames[9].name, "frame10.png");
        assert_eq!((report.frames[9].x, report.frames[9].y), (0, 30));

        let sheet = image::open(&report.output).unwrap().to_rgba8();
        assert_eq!(sheet.dimensions(), (report.width, report.height));
        // frame10 at row 3, col 0
        assert_eq!(sheet.get_pixel(0, 30), &Rgba([10, 0, 0, 255]));
        // frame2 at row 0, col 1
        assert_eq!(sheet.get_pixel(10, 0), &Rgba([2, 0, 0, 255]));
        // trailing empty cells stay transparent
        assert_eq!(sheet.get_pixel(27, 37), &Rgba([0, 0, 0, 0]));

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(report.metadata_path()).unwrap()).unwrap();
        assert_eq!(meta["frames"].as_array().unwrap().len(), 10);
        assert_eq!(meta["grid"]["columns"], 3);
    }

    #[test]
    fn test_reverse_run() {
        let tmp = tempfile::tempdir().unwrap();
        numbered_sequence(tmp.path(), 3);

        let mut job = SpriteSheetJob::new(tmp.path(), tmp.path().join("sheet.png"));
        job.reverse = true;
        job.rows = 1;

        let report = Pipeline::new().run(&job, &NoProgress).unwrap();
        let names: Vec<&str> = report.frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["frame3.png", "frame2.png", "frame1.png"]);

        let sheet = image::open(&report.output).unwrap().to_rgba8();
        assert_eq!(sheet.get_pixel(0, 0)[0], 3);
        assert_eq!(sheet.get_pixel(16, 0)[0], 1);
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        for i in 1..=6u8 {
            write_frame(&src, &format!("walk_{:03}.png", i), 5 + i as u32, 7, [i * 40, 100, 200, 128 + i]);
        }

        let render = |name: &str, threads: usize| {
            let mut job = SpriteSheetJob::new(&src, tmp.path().join(name));
            job.scale_percent = 150.0;
            job.padding = 1;
            Pipeline::new().threads(threads).run(&job, &NoProgress).unwrap();
            std::fs::read(tmp.path().join(name)).unwrap()
        };

        assert_eq!(render("a.png", 1), render("b.png", 4));
    }

    #[test]
    fn test_jpeg_output_is_opaque_background() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        // Fully transparent frames: everything becomes background
        for i in 1..=4 {
            write_frame(&src, &format!("ghost{}.png", i), 16, 16, [255, 255, 255, 0]);
        }

        let mut job = SpriteSheetJob::new(&src, tmp.path().join("sheet.jpg"));
        job.background = [128, 128, 128];
        let report = Pipeline::new().run(&job, &NoProgress).unwrap();
        assert_eq!(report.format, OutputFormat::Jpeg);

        let sheet = image::open(&report.output).unwrap();
        assert!(!sheet.color().has_alpha());
        let px = sheet.to_rgb8().get_pixel(20, 20).0;
        assert!(px.iter().all(|&c| (c as i32 - 128).abs() <= 2), "got {:?}", px);
    }

    #[test]
    fn test_grid_too_small_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        numbered_sequence(tmp.path(), 10);

        let mut job = SpriteSheetJob::new(tmp.path(), tmp.path().join("out/sheet.png"));
        job.columns = 2;
        job.rows = 2;

        assert!(matches!(
            Pipeline::new().run(&job, &NoProgress),
            Err(SheetError::GridTooSmall { .. })
        ));
        assert!(!tmp.path().join("out/sheet.png").exists());
    }

    #[test]
    fn test_exr_and_tiff_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let hdr = image::Rgba32FImage::from_pixel(4, 4, Rgba([4.0, 0.0, 0.0, 1.0]));
        image::DynamicImage::ImageRgba32F(hdr).save(src.join("shot_1.exr")).unwrap();
        write_frame(&src, "shot_2.tif", 4, 4, [0, 200, 0, 255]);

        let job = SpriteSheetJob::new(&src, tmp.path().join("sheet.png"));
        let report = Pipeline::new().run(&job, &NoProgress).unwrap();
        assert_eq!((report.grid.columns, report.grid.rows), (2, 1));

        let sheet = image::open(&report.output).unwrap().to_rgba8();
        assert_eq!(sheet.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(sheet.get_pixel(4, 0), &Rgba([0, 200, 0, 255]));
    }

    #[test]
    fn test_oversized_canvas_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_frame(tmp.path(), "huge.png", 100, 100, [1, 2, 3, 255]);

        // 2e9 x 2e9 px: valid u32 dimensions, far beyond any allocation
        let mut job = SpriteSheetJob::new(tmp.path(), tmp.path().join("sheet.png"));
        job.scale_percent = 2_000_000_000.0;

        assert!(matches!(
            Pipeline::new().run(&job, &NoProgress),
            Err(SheetError::InvalidJob(_))
        ));
        assert!(!tmp.path().join("sheet.png").exists());
    }

    #[test]
    fn test_corrupt_frame_fails_run() {
        let tmp = tempfile::tempdir().unwrap();
        numbered_sequence(tmp.path(), 3);
        std::fs::write(tmp.path().join("frame4.png"), b"not an image").unwrap();

        let job = SpriteSheetJob::new(tmp.path(), tmp.path().join("sheet.png"));
        match Pipeline::new().run(&job, &NoProgress) {
            Err(SheetError::FrameDecodeFailed { path, .. }) => {
                assert_eq!(path.file_name().unwrap(), "frame4.png")
            }
            other => panic!("expected FrameDecodeFailed, got {:?}", other.map(|r| r.output)),
        }
        assert!(!tmp.path().join("sheet.png").exists());
    }

    #[test]
    fn test_cancel_leaves_no_output() {
        let tmp = tempfile::tempdir().unwrap();
        numbered_sequence(tmp.path(), 4);

        let job = SpriteSheetJob::new(tmp.path(), tmp.path().join("sheet.png"));
        let (sink, rx) = ChannelProgress::new();
        sink.cancel();

        assert!(matches!(Pipeline::new().run(&job, &sink), Err(SheetError::Cancelled)));
        assert!(!tmp.path().join("sheet.png").exists());
        assert!(rx.try_iter().all(|p| p.stage != SheetStage::Encoding));
    }

    #[test]
    fn test_project_root_output() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        numbered_sequence(&src, 2);

        let job = SpriteSheetJob::new(&src, "//textures/walk");
        let report = Pipeline::new()
            .project_root(tmp.path())
            .run(&job, &NoProgress)
            .unwrap();
        assert_eq!(report.output, tmp.path().join("textures/walk.png"));
        assert!(report.output.exists());
    }

    #[test]
    fn test_filter_and_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_frame(tmp.path(), "walk_001.png", 4, 4, [1, 1, 1, 255]);
        write_frame(tmp.path(), "run_001.png", 4, 4, [2, 2, 2, 255]);

        let mut job = SpriteSheetJob::new(tmp.path(), tmp.path().join("s.png"));
        job.filter = "walk".into();
        let report = Pipeline::new().scan(&job).unwrap();
        assert_eq!(report.files, vec![tmp.path().join("walk_001.png")]);

        let job = SpriteSheetJob::new(tmp.path().join("missing"), tmp.path().join("s.png"));
        assert!(matches!(
            Pipeline::new().run(&job, &NoProgress),
            Err(SheetError::DirectoryNotFound(_))
        ));
    }
}
