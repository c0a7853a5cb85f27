//! Output encoding
//!
//! Takes ownership of the finished canvas, flattens it for formats without
//! alpha, and writes it through the codec. A failed write never leaves a
//! partial file behind and never touches an existing sheet.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use log::{debug, info, warn};

use crate::codec::{ImageCodec, OutputFormat};
use crate::compositor::Canvas;
use crate::error::{Result, SheetError};

/// Composite RGBA over an opaque background color
pub fn flatten(image: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let a = src[3] as u32;
        let mut px = [0u8; 3];
        for c in 0..3 {
            // Integer "over" with rounding
            let v = src[c] as u32 * a + background[c] as u32 * (255 - a);
            px[c] = ((v + 127) / 255) as u8;
        }
        *dst = Rgb(px);
    }
    out
}

/// Convert canvas to what `format` can store
fn prepare_image(canvas: Canvas, format: OutputFormat, background: [u8; 3]) -> Result<DynamicImage> {
    let rgba = canvas.into_image()?;
    if format.has_alpha() {
        Ok(DynamicImage::ImageRgba8(rgba))
    } else {
        debug!("Flattening alpha onto background {:?} for {}", background, format);
        Ok(DynamicImage::ImageRgb8(flatten(&rgba, background)))
    }
}

/// Write `canvas` to `path`, creating parent directories
///
/// The codec writes into a temporary file next to `path`, which replaces
/// `path` only after a successful encode. On failure an existing file at
/// `path` is left untouched.
pub fn encode_canvas(
    codec: &dyn ImageCodec,
    canvas: Canvas,
    format: OutputFormat,
    path: &Path,
    background: [u8; 3],
) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(|e| SheetError::write(parent, e))?;
            parent
        }
        None => Path::new("."),
    };
    if path.is_dir() {
        return Err(SheetError::write(path, "destination is a directory"));
    }

    let (w, h) = (canvas.width(), canvas.height());
    let image = prepare_image(canvas, format, background)?;

    let suffix = format!(".{}", format.extension());
    let mut builder = tempfile::Builder::new();
    builder.prefix(".seqsheet-").suffix(&suffix);
    // Temp files default to 0600; a sheet should get the usual mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let tmp = builder.tempfile_in(parent).map_err(|e| SheetError::write(path, e))?;
    debug!("Encoding into {}", tmp.path().display());

    if let Err(e) = codec.encode(&image, format, tmp.path()) {
        if let Err(rm) = tmp.close() {
            warn!("Failed to remove partial output: {}", rm);
        }
        return Err(e);
    }

    tmp.persist(path).map_err(|e| SheetError::write(path, e.error))?;
    info!("Wrote {} {}x{}: {}", format, w, h, path.display());
    Ok(())
}
