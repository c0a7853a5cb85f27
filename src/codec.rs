//! Image codec backend
//!
//! The compositor and encoder never call an image library directly; they go
//! through `ImageCodec`, so the backend can be swapped (or mocked in tests).
//! `ImageCrateCodec` is the default and uses the `image` crate for every
//! format, including EXR (via exrs).

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetError};

/// Decode/encode capability used by the pipeline
pub trait ImageCodec: Send + Sync {
    /// Read image size without decoding pixel data (where the format allows)
    fn probe(&self, path: &Path) -> Result<(u32, u32)>;

    /// Decode to 8-bit RGBA
    fn decode(&self, path: &Path) -> Result<RgbaImage>;

    /// Write `image` to `path` in `format`
    fn encode(&self, image: &DynamicImage, format: OutputFormat, path: &Path) -> Result<()>;
}

/// Default backend: `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    fn is_exr(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("exr"))
            .unwrap_or(false)
    }
}

impl ImageCodec for ImageCrateCodec {
    fn probe(&self, path: &Path) -> Result<(u32, u32)> {
        debug!("Probing header: {}", path.display());
        image::ImageReader::open(path)
            .map_err(|e| SheetError::decode(path, e))?
            .with_guessed_format()
            .map_err(|e| SheetError::decode(path, e))?
            .into_dimensions()
            .map_err(|e| SheetError::decode(path, e))
    }

    fn decode(&self, path: &Path) -> Result<RgbaImage> {
        let img = image::ImageReader::open(path)
            .map_err(|e| SheetError::decode(path, e))?
            .with_guessed_format()
            .map_err(|e| SheetError::decode(path, e))?
            .decode()
            .map_err(|e| SheetError::decode(path, e))?;

        if Self::is_exr(path) {
            // Float data: values outside 0..1 clamp on conversion
            debug!("Loaded EXR {}x{} ({:?}): {}", img.width(), img.height(), img.color(), path.display());
        } else {
            debug!("Loaded {}x{} ({:?}): {}", img.width(), img.height(), img.color(), path.display());
        }

        Ok(img.to_rgba8())
    }

    fn encode(&self, image: &DynamicImage, format: OutputFormat, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| SheetError::write(path, e))?;
        let mut writer = BufWriter::new(file);
        image
            .write_to(&mut writer, format.image_format())
            .map_err(|e| SheetError::write(path, e))?;
        // BufWriter drop ignores flush errors
        std::io::Write::flush(&mut writer).map_err(|e| SheetError::write(path, e))?;
        Ok(())
    }
}

/// Sheet output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Tga,
    Bmp,
}

impl OutputFormat {
    pub fn all() -> &'static [OutputFormat] {
        &[OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Tga, OutputFormat::Bmp]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tga => "tga",
            OutputFormat::Bmp => "bmp",
        }
    }

    /// PNG and TGA keep alpha; JPEG and BMP are flattened
    pub fn has_alpha(&self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Tga)
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Tga => ImageFormat::Tga,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }

    /// Format from a file extension, `None` if the path has none
    pub fn from_path(path: &Path) -> Option<Result<Self>> {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.parse())
    }
}

impl FromStr for OutputFormat {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "tga" | "targa" => Ok(OutputFormat::Tga),
            "bmp" => Ok(OutputFormat::Bmp),
            _ => Err(SheetError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = SheetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(f: OutputFormat) -> Self {
        f.to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Png => write!(f, "PNG"),
            OutputFormat::Jpeg => write!(f, "JPEG"),
            OutputFormat::Tga => write!(f, "TGA"),
            OutputFormat::Bmp => write!(f, "BMP"),
        }
    }
}

/// Resampling filter for frame scaling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResampleFilter {
    pub fn filter_type(&self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            ResampleFilter::Bilinear => FilterType::Triangle,
            ResampleFilter::Bicubic => FilterType::CatmullRom,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" | "linear" | "triangle" => Ok(ResampleFilter::Bilinear),
            "bicubic" | "cubic" | "catmullrom" => Ok(ResampleFilter::Bicubic),
            "lanczos" | "lanczos3" => Ok(ResampleFilter::Lanczos3),
            _ => Err(SheetError::InvalidJob(format!("Unknown resample filter: {}", s))),
        }
    }
}
