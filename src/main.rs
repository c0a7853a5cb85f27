use seqsheet::cli::{Args, BuildArgs, Command, ScanArgs};
use seqsheet::paths;
use seqsheet::progress::{BarProgress, NoProgress, ProgressSink};
use seqsheet::{Pipeline, SpriteSheetJob};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

fn init_logger(args: &Args, path_config: &paths::PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = match log_path_opt {
            Some(path) => path.clone(),
            None => {
                paths::ensure_dirs(path_config)?;
                paths::data_file(paths::LOG_FILE, path_config)
            }
        };
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Built-in defaults overlaid with the user defaults file, if any
fn base_job(path_config: &paths::PathConfig) -> Result<SpriteSheetJob> {
    let defaults = paths::config_file(paths::DEFAULTS_FILE, path_config);
    if defaults.is_file() {
        debug!("User defaults: {}", defaults.display());
        return SpriteSheetJob::load(&defaults)
            .with_context(|| format!("Failed to read defaults: {}", defaults.display()));
    }
    Ok(SpriteSheetJob::default())
}

fn run_scan(args: &ScanArgs, path_config: &paths::PathConfig) -> Result<()> {
    let mut job = base_job(path_config)?;
    job.source_dir = args.source_dir.clone();
    if let Some(filter) = &args.filter {
        job.filter = filter.clone();
    }
    job.reverse = args.reverse;

    let report = Pipeline::new().scan(&job)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} frames", report.frame_count);
        for path in &report.files {
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run_build(args: &BuildArgs, path_config: &paths::PathConfig) -> Result<()> {
    let base = match &args.job {
        Some(path) => SpriteSheetJob::load(path)
            .with_context(|| format!("Failed to load job: {}", path.display()))?,
        None => base_job(path_config)?,
    };
    let job = args.apply_to(base)?;
    debug!("Effective job: {:?}", job);

    if let Some(path) = &args.save_job {
        job.save(path)
            .with_context(|| format!("Failed to save job: {}", path.display()))?;
        info!("Saved job: {}", path.display());
    }

    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let pipeline = Pipeline::new().threads(args.threads).project_root(root);

    let bar = (!args.quiet).then(BarProgress::new);
    let progress: &dyn ProgressSink = match &bar {
        Some(bar) => bar,
        None => &NoProgress,
    };

    let result = pipeline.run(&job, progress);
    if let Some(bar) = &bar {
        bar.finish();
    }
    let report = result
        .with_context(|| format!("Failed to build sprite sheet from {}", job.source_dir.display()))?;

    println!(
        "{}: {} frames, {}x{} grid, {}x{} px",
        report.output.display(),
        report.frames.len(),
        report.grid.columns,
        report.grid.rows,
        report.width,
        report.height
    );
    if job.metadata {
        println!("{}", report.metadata_path().display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = paths::PathConfig::from_env_and_cli(args.config_dir.clone());
    init_logger(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    match &args.command {
        Command::Scan(scan) => run_scan(scan, &path_config),
        Command::Build(build) => run_build(build, &path_config),
    }
}
