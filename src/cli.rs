use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::codec::{OutputFormat, ResampleFilter};
use crate::job::SpriteSheetJob;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "EXR:    exrs (pure Rust)\n",
    "Codecs: PNG, JPEG, TGA, BMP, TIFF (in), EXR (in)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Pack an image sequence into a sprite sheet
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: seqsheet.log in the data dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List matching frames in sequence order without building a sheet
    Scan(ScanArgs),
    /// Build a sprite sheet
    Build(BuildArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Source directory with frame images
    #[arg(value_name = "DIR")]
    pub source_dir: PathBuf,

    /// Filename filter: substring, or glob if it contains * ? [
    #[arg(short = 'f', long = "filter", value_name = "PATTERN")]
    pub filter: Option<String>,

    /// List frames in reverse order
    #[arg(short = 'r', long = "reverse")]
    pub reverse: bool,

    /// Print the result as JSON
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Source directory with frame images (overrides the job file)
    #[arg(value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Output image path; `//path` is relative to --root
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Filename filter: substring, or glob if it contains * ? [
    #[arg(short = 'f', long = "filter", value_name = "PATTERN")]
    pub filter: Option<String>,

    /// Number of columns (0 = auto)
    #[arg(long = "columns", value_name = "N")]
    pub columns: Option<u32>,

    /// Number of rows (0 = auto)
    #[arg(long = "rows", value_name = "N")]
    pub rows: Option<u32>,

    /// Pixels between cells
    #[arg(short = 'p', long = "padding", value_name = "PX")]
    pub padding: Option<u32>,

    /// Frame scale in percent (e.g. 50, 200)
    #[arg(short = 's', long = "scale", value_name = "PERCENT")]
    pub scale: Option<f64>,

    /// Place frames in reverse order (`--reverse=false` overrides a job file)
    #[arg(
        short = 'r',
        long = "reverse",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub reverse: Option<bool>,

    /// Output format: png, jpeg, tga, bmp (default: from output extension)
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<String>,

    /// Background for formats without alpha: #rrggbb or r,g,b
    #[arg(long = "background", value_name = "COLOR", value_parser = parse_color)]
    pub background: Option<[u8; 3]>,

    /// Resampling filter: bilinear, bicubic, lanczos3
    #[arg(long = "resample", value_name = "FILTER")]
    pub resample: Option<String>,

    /// Also write <output>.json with frame rectangles (`--metadata=false` to disable)
    #[arg(
        short = 'm',
        long = "metadata",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub metadata: Option<bool>,

    /// Decode threads (0 = auto)
    #[arg(short = 'j', long = "threads", value_name = "N", default_value = "0")]
    pub threads: usize,

    /// Load job settings from JSON file
    #[arg(long = "job", value_name = "FILE")]
    pub job: Option<PathBuf>,

    /// Save the effective job settings to JSON file
    #[arg(long = "save-job", value_name = "FILE")]
    pub save_job: Option<PathBuf>,

    /// Project root for `//` output paths (default: current directory)
    #[arg(long = "root", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl BuildArgs {
    /// Overlay explicitly given flags on `job`
    pub fn apply_to(&self, mut job: SpriteSheetJob) -> crate::Result<SpriteSheetJob> {
        if let Some(dir) = &self.source_dir {
            job.source_dir = dir.clone();
        }
        if let Some(out) = &self.output {
            job.output_path = out.clone();
        }
        if let Some(filter) = &self.filter {
            job.filter = filter.clone();
        }
        if let Some(columns) = self.columns {
            job.columns = columns;
        }
        if let Some(rows) = self.rows {
            job.rows = rows;
        }
        if let Some(padding) = self.padding {
            job.padding = padding;
        }
        if let Some(scale) = self.scale {
            job.scale_percent = scale;
        }
        if let Some(reverse) = self.reverse {
            job.reverse = reverse;
        }
        if let Some(format) = &self.format {
            job.format = Some(format.parse::<OutputFormat>()?);
        }
        if let Some(bg) = self.background {
            job.background = bg;
        }
        if let Some(resample) = &self.resample {
            job.resample = resample.parse::<ResampleFilter>()?;
        }
        if let Some(metadata) = self.metadata {
            job.metadata = metadata;
        }
        Ok(job)
    }
}

/// Parse `#rrggbb`, `rrggbb` or `r,g,b`
pub fn parse_color(s: &str) -> Result<[u8; 3], String> {
    let s = s.trim();
    if s.contains(',') {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("Expected r,g,b, got {:?}", s));
        }
        let mut rgb = [0u8; 3];
        for (c, part) in rgb.iter_mut().zip(&parts) {
            *c = part
                .parse::<u8>()
                .map_err(|e| format!("Bad color component {:?}: {}", part, e))?;
        }
        return Ok(rgb);
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("Expected #rrggbb, got {:?}", s));
    }
    let mut rgb = [0u8; 3];
    for (i, c) in rgb.iter_mut().enumerate() {
        *c = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("Bad hex color {:?}: {}", s, e))?;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_color("0A0B0C").unwrap(), [10, 11, 12]);
        assert_eq!(parse_color("1, 2,3").unwrap(), [1, 2, 3]);
        assert!(parse_color("#fff").is_err());
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("256,0,0").is_err());
        assert!(parse_color("zzzzzz").is_err());
    }

    #[test]
    fn test_build_args_parse() {
        let args = Args::try_parse_from([
            "seqsheet", "build", "frames", "-o", "sheet.png", "--columns", "4", "-p", "2",
            "--scale", "50", "--reverse", "--background", "#102030", "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbosity, 2);

        let Command::Build(build) = args.command else {
            panic!("expected build command");
        };
        let job = build.apply_to(SpriteSheetJob::default()).unwrap();
        assert_eq!(job.source_dir, PathBuf::from("frames"));
        assert_eq!(job.output_path, PathBuf::from("sheet.png"));
        assert_eq!(job.columns, 4);
        assert_eq!(job.rows, 0);
        assert_eq!(job.padding, 2);
        assert_eq!(job.scale_percent, 50.0);
        assert!(job.reverse);
        assert_eq!(job.background, [16, 32, 48]);
    }

    #[test]
    fn test_flags_override_job_file_values() {
        let args = Args::try_parse_from(["seqsheet", "build", "--rows", "3"]).unwrap();
        let Command::Build(build) = args.command else {
            panic!("expected build command");
        };

        let mut base = SpriteSheetJob::new("from_job", "job.png");
        base.rows = 1;
        base.padding = 7;
        let job = build.apply_to(base).unwrap();
        assert_eq!(job.source_dir, PathBuf::from("from_job"));
        assert_eq!(job.rows, 3);
        assert_eq!(job.padding, 7);
    }

    #[test]
    fn test_bool_flags_override_job_file_both_ways() {
        let build_of = |argv: &[&str]| {
            let mut full = vec!["seqsheet", "build"];
            full.extend_from_slice(argv);
            match Args::try_parse_from(full).unwrap().command {
                Command::Build(build) => build,
                Command::Scan(_) => panic!("expected build command"),
            }
        };

        let mut base = SpriteSheetJob::default();
        base.reverse = true;
        base.metadata = true;

        let job = build_of(&["--reverse=false", "--metadata=false"]).apply_to(base.clone()).unwrap();
        assert!(!job.reverse);
        assert!(!job.metadata);

        // Absent flags keep the job file values
        let job = build_of(&[]).apply_to(base.clone()).unwrap();
        assert!(job.reverse);
        assert!(job.metadata);

        // Bare flags still switch on, and do not swallow the directory
        let build = build_of(&["-r", "frames", "-m"]);
        assert_eq!(build.source_dir, Some(PathBuf::from("frames")));
        let job = build.apply_to(SpriteSheetJob::default()).unwrap();
        assert!(job.reverse);
        assert!(job.metadata);
    }

    #[test]
    fn test_unsupported_format_flag() {
        let args = Args::try_parse_from(["seqsheet", "build", "d", "--format", "gif"]).unwrap();
        let Command::Build(build) = args.command else {
            panic!("expected build command");
        };
        assert!(matches!(
            build.apply_to(SpriteSheetJob::default()),
            Err(crate::SheetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_scan_args_parse() {
        let args = Args::try_parse_from(["seqsheet", "scan", "frames", "-f", "walk_*"]).unwrap();
        match args.command {
            Command::Scan(scan) => {
                assert_eq!(scan.source_dir, PathBuf::from("frames"));
                assert_eq!(scan.filter.as_deref(), Some("walk_*"));
            }
            Command::Build(_) => panic!("expected scan command"),
        }
    }
}
