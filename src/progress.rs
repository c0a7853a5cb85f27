//! Progress reporting and cancellation
//!
//! The pipeline calls a `ProgressSink` once per stage change and once per
//! composited frame. A sink may ask for cancellation; the run then stops
//! before anything is written.
//!
//! - `NoProgress`: ignores everything
//! - `ChannelProgress`: sends `SheetProgress` over a channel, shared cancel flag
//!   (for hosts running the pipeline on a background thread)
//! - `BarProgress`: terminal progress bar

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline stages
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetStage {
    Scanning,    // Listing source directory
    Probing,     // Reading frame headers
    Compositing, // Decoding and placing frames
    Encoding,    // Writing output file
    Complete,    // Successfully finished
}

/// Progress update
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetProgress {
    pub current_frame: usize,
    pub total_frames: usize,
    pub stage: SheetStage,
}

/// Receives progress from the pipeline; may be called from worker threads
pub trait ProgressSink: Send + Sync {
    fn on_stage(&self, _stage: SheetStage, _total_frames: usize) {}

    /// `done` frames of `total` are placed; `path` is the one just finished
    fn on_frame(&self, done: usize, total: usize, path: &Path);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_frame(&self, _done: usize, _total: usize, _path: &Path) {}
}

/// Channel-backed sink with a cancel flag
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<SheetProgress>,
    cancel_flag: Arc<AtomicBool>,
}

impl ChannelProgress {
    pub fn new() -> (Self, Receiver<SheetProgress>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = Self {
            tx,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    /// Flag to set from another thread to stop the run
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

impl ProgressSink for ChannelProgress {
    fn on_stage(&self, stage: SheetStage, total_frames: usize) {
        let current_frame = if stage == SheetStage::Complete { total_frames } else { 0 };
        // Receiver may be gone; progress is best-effort
        let _ = self.tx.send(SheetProgress {
            current_frame,
            total_frames,
            stage,
        });
    }

    fn on_frame(&self, done: usize, total: usize, _path: &Path) {
        let _ = self.tx.send(SheetProgress {
            current_frame: done,
            total_frames: total,
            stage: SheetStage::Compositing,
        });
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Terminal progress bar (stderr)
#[derive(Debug)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn on_stage(&self, stage: SheetStage, total_frames: usize) {
        self.bar.set_length(total_frames as u64);
        self.bar.set_message(format!("{:?}", stage));
    }

    fn on_frame(&self, done: usize, _total: usize, path: &Path) {
        self.bar.set_position(done as u64);
        if let Some(name) = path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_progress_messages() {
        let (sink, rx) = ChannelProgress::new();
        sink.on_stage(SheetStage::Compositing, 3);
        sink.on_frame(1, 3, Path::new("a.png"));
        sink.on_stage(SheetStage::Complete, 3);

        let got: Vec<SheetProgress> = rx.try_iter().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[1].current_frame, 1);
        assert_eq!(got[2].stage, SheetStage::Complete);
        assert_eq!(got[2].current_frame, 3);
    }

    #[test]
    fn test_cancel_flag_shared() {
        let (sink, _rx) = ChannelProgress::new();
        assert!(!sink.is_cancelled());
        sink.cancel_flag().store(true, Ordering::Relaxed);
        assert!(sink.is_cancelled());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.on_frame(1, 1, Path::new("a.png"));
    }
}
