//! Sprite compositor - places scaled frames into one canvas.
//!
//! Three steps, all driven by `Pipeline`:
//! 1. `prepare`: optional whole-sequence reversal, then header probe of every
//!    frame (dimensions only, no pixel decode)
//! 2. `layout`: grid shape + uniform cell size (max scaled frame size)
//! 3. `composite`: decode, scale and copy each frame into its cell
//!
//! # Parallelism
//!
//! The canvas is split into horizontal bands, one per grid row
//! (`cell_height + padding` pixel rows each, the last band without padding).
//! Bands are disjoint `&mut` slices handed to a bounded rayon pool, so every
//! frame writes only its own pre-addressed region and the result does not
//! depend on completion order. At most one decoded frame per worker is alive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use image::RgbaImage;
use log::{debug, error, info, trace};
use rayon::prelude::*;

use crate::codec::{ImageCodec, ResampleFilter};
use crate::error::{Result, SheetError};
use crate::frame::{ImageFrame, SequenceManifest};
use crate::grid::{GridSpec, resolve_grid};
use crate::progress::{ProgressSink, SheetStage};

/// Scale `(width, height)` by `scale_percent / 100`, rounded, at least 1x1
pub fn scaled_size(width: u32, height: u32, scale_percent: f64) -> (u32, u32) {
    let scale = |d: u32| ((d as f64 * scale_percent / 100.0).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Transparent RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Fully transparent canvas; fails instead of aborting when memory runs out
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let too_large = || SheetError::InvalidJob(format!("Canvas {}x{} too large", width, height));
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(too_large)?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|e| {
            error!("Canvas allocation of {} bytes failed: {}", len, e);
            too_large()
        })?;
        pixels.resize(len, 0u8);

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wrap an existing image as a canvas (no copy)
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    /// Hand the buffer over as an image (no copy)
    pub fn into_image(self) -> Result<RgbaImage> {
        let (w, h) = (self.width, self.height);
        RgbaImage::from_raw(w, h, self.pixels)
            .ok_or_else(|| SheetError::InvalidJob(format!("Canvas buffer does not match {}x{}", w, h)))
    }
}

/// Copy `img` into a band slice at column offset `x` (pixels), row 0
fn blit(band: &mut [u8], stride: usize, x: u32, img: &RgbaImage) {
    let row_bytes = img.width() as usize * 4;
    let x_off = x as usize * 4;
    for (y, src) in img.as_raw().chunks_exact(row_bytes).enumerate() {
        let start = y * stride + x_off;
        band[start..start + row_bytes].copy_from_slice(src);
    }
}

/// Compositor settings plus the worker pool it runs on
pub struct Compositor<'a> {
    codec: &'a dyn ImageCodec,
    scale_percent: f64,
    filter: ResampleFilter,
    reverse: bool,
    pool: rayon::ThreadPool,
}

impl<'a> Compositor<'a> {
    /// `threads == 0` picks `num_cpus * 3 / 4` (at least 1)
    pub fn new(
        codec: &'a dyn ImageCodec,
        scale_percent: f64,
        filter: ResampleFilter,
        reverse: bool,
        threads: usize,
    ) -> Result<Self> {
        if !(scale_percent.is_finite() && scale_percent > 0.0) {
            return Err(SheetError::InvalidJob(format!(
                "Scale must be a positive number, got {}",
                scale_percent
            )));
        }
        let threads = if threads == 0 { (num_cpus::get() * 3 / 4).max(1) } else { threads };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("seqsheet-worker-{}", i))
            .build()
            .map_err(|e| SheetError::Worker(e.to_string()))?;
        trace!("Compositor pool: {} threads", threads);

        Ok(Self {
            codec,
            scale_percent,
            filter,
            reverse,
            pool,
        })
    }

    /// Apply reversal and attach probed dimensions to every frame
    pub fn prepare(&self, manifest: SequenceManifest) -> Result<SequenceManifest> {
        let manifest = if self.reverse { manifest.reversed() } else { manifest };

        let codec = self.codec;
        let probed: Vec<ImageFrame> = self.pool.install(|| {
            manifest
                .frames()
                .par_iter()
                .map(|frame| {
                    let (w, h) = codec.probe(frame.path())?;
                    Ok(frame.clone().with_dimensions(w, h))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(manifest.replace_frames(probed))
    }

    /// Scaled size of a probed frame
    fn target_size(&self, frame: &ImageFrame) -> Option<(u32, u32)> {
        frame
            .dimensions()
            .map(|(w, h)| scaled_size(w, h, self.scale_percent))
    }

    /// Resolve the grid and the uniform cell size for a prepared manifest
    pub fn layout(&self, manifest: &SequenceManifest, columns: u32, rows: u32, padding: u32) -> Result<GridSpec> {
        let (columns, rows) = resolve_grid(manifest.len(), columns, rows)?;

        let (mut cell_w, mut cell_h) = (1u32, 1u32);
        for frame in manifest {
            let (w, h) = self.target_size(frame).ok_or_else(|| {
                SheetError::decode(frame.path(), "frame dimensions were not probed")
            })?;
            cell_w = cell_w.max(w);
            cell_h = cell_h.max(h);
        }

        let canvas_w = columns as u64 * cell_w as u64 + padding as u64 * (columns as u64 - 1);
        let canvas_h = rows as u64 * cell_h as u64 + padding as u64 * (rows as u64 - 1);
        if canvas_w > u32::MAX as u64 || canvas_h > u32::MAX as u64 {
            return Err(SheetError::InvalidJob(format!(
                "Canvas {}x{} too large",
                canvas_w, canvas_h
            )));
        }

        let grid = GridSpec::new(columns, rows, cell_w, cell_h, padding);
        info!(
            "Layout: {}x{} cells of {}x{} px, padding {} -> {}x{} canvas",
            columns, rows, cell_w, cell_h, padding, canvas_w, canvas_h
        );
        Ok(grid)
    }

    /// Decode and scale one frame to its target size
    fn render_frame(&self, frame: &ImageFrame) -> Result<RgbaImage> {
        let img = self.codec.decode(frame.path())?;
        let (w, h) = self
            .target_size(frame)
            .unwrap_or_else(|| scaled_size(img.width(), img.height(), self.scale_percent));

        if img.dimensions() == (w, h) {
            return Ok(img);
        }
        trace!("Resizing {} {:?} -> {}x{}", frame.raw_filename(), img.dimensions(), w, h);
        Ok(image::imageops::resize(&img, w, h, self.filter.filter_type()))
    }

    /// Build the canvas. Any decode failure or cancellation fails the whole run.
    pub fn composite(
        &self,
        manifest: &SequenceManifest,
        grid: &GridSpec,
        progress: &dyn ProgressSink,
    ) -> Result<Canvas> {
        let total = manifest.len();
        if total > grid.capacity() {
            return Err(SheetError::GridTooSmall {
                columns: grid.columns,
                rows: grid.rows,
                frames: total,
            });
        }

        let (width, height) = grid.canvas_size();
        let mut canvas = Canvas::new(width, height)?;
        progress.on_stage(SheetStage::Compositing, total);

        let stride = width as usize * 4;
        let band_len = stride * (grid.cell_height + grid.padding) as usize;
        let columns = grid.columns as usize;
        let frames = manifest.frames();
        let cancelled = AtomicBool::new(false);
        // Lowest frame index known to have failed; later frames are skipped
        let failed_at = AtomicUsize::new(usize::MAX);
        let done = AtomicUsize::new(0);

        let results: Vec<Result<()>> = self.pool.install(|| {
            canvas
                .pixels
                .par_chunks_mut(band_len)
                .enumerate()
                .map(|(row, band)| {
                    let first = (row * columns).min(total);
                    let last = (first + columns).min(total);
                    trace!("Band {}: frames {}..{}", row, first, last);

                    for (offset, frame) in frames[first..last].iter().enumerate() {
                        let index = first + offset;
                        if cancelled.load(Ordering::Relaxed) || index > failed_at.load(Ordering::Relaxed) {
                            return Ok(());
                        }
                        if progress.is_cancelled() {
                            cancelled.store(true, Ordering::Relaxed);
                            return Err(SheetError::Cancelled);
                        }

                        let img = match self.render_frame(frame) {
                            Ok(img) => img,
                            Err(e) => {
                                failed_at.fetch_min(index, Ordering::Relaxed);
                                return Err(e);
                            }
                        };
                        let (x, _) = grid.cell_origin(index);
                        blit(band, stride, x, &img);

                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        progress.on_frame(n, total, frame.path());
                    }
                    Ok(())
                })
                .collect()
        });

        // Bands are in grid order, so this is the lowest failing frame
        for result in results {
            result?;
        }

        debug!("Composited {} frames into {}x{}", total, width, height);
        Ok(canvas)
    }
}
