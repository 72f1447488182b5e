// src/progress.rs

//! Fractional progress reporting
//!
//! Long-running operations (downloads, extraction, installs) report progress
//! as a fraction in `0.0..=1.0` through the [`ProgressReporter`] trait. Any
//! `Fn(f32)` closure is a reporter, so library callers can pass a plain
//! callback while the CLI uses [`CliProgress`] to drive an indicatif bar.
//!
//! Nested operations are expressed with [`StageProgress`], which maps a
//! child's `0.0..=1.0` onto a sub-range of its parent. An install maps the
//! download into `0.0..0.4`, extraction into `0.5..0.8`, and so on.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tracing::info;

/// Resolution of the indicatif bar used by [`CliProgress`]
const CLI_BAR_LENGTH: u64 = 1000;

/// Receiver of fractional progress updates
pub trait ProgressReporter: Send + Sync {
    /// Report completion as a fraction in `0.0..=1.0`
    fn report(&self, fraction: f32);
}

impl<F> ProgressReporter for F
where
    F: Fn(f32) + Send + Sync,
{
    fn report(&self, fraction: f32) {
        self(fraction)
    }
}

fn clamp_fraction(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// No-op reporter for quiet and scripted use
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _fraction: f32) {}
}

/// Maps a child operation's progress onto `[start, end]` of a parent
pub struct StageProgress<'a> {
    parent: &'a dyn ProgressReporter,
    start: f32,
    end: f32,
}

impl<'a> StageProgress<'a> {
    pub fn new(parent: &'a dyn ProgressReporter, start: f32, end: f32) -> Self {
        Self { parent, start, end }
    }

    /// Report the start of the stage
    pub fn begin(&self) {
        self.parent.report(self.start);
    }

    /// Report the end of the stage
    pub fn complete(&self) {
        self.parent.report(self.end);
    }
}

impl ProgressReporter for StageProgress<'_> {
    fn report(&self, fraction: f32) {
        let fraction = clamp_fraction(fraction);
        self.parent
            .report(self.start + (self.end - self.start) * fraction);
    }
}

/// Logs progress to tracing every ten percent
pub struct LogProgress {
    name: String,
    last_decile: Mutex<Option<u32>>,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_decile: Mutex::new(None),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, fraction: f32) {
        let decile = (clamp_fraction(fraction) * 10.0).floor() as u32;
        let Ok(mut last) = self.last_decile.lock() else {
            return;
        };
        if last.is_none_or(|previous| decile > previous) {
            *last = Some(decile);
            info!("{}: {}%", self.name, decile * 10);
        }
    }
}

/// Terminal progress bar backed by indicatif
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new(CLI_BAR_LENGTH);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg:24} [{bar:40.cyan/blue}] {percent:>3}%")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.into());
        Self { bar }
    }

    pub fn finish_with_message(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon_with_message(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

impl ProgressReporter for CliProgress {
    fn report(&self, fraction: f32) {
        let position = (clamp_fraction(fraction) * CLI_BAR_LENGTH as f32) as u64;
        self.bar.set_position(position);
    }
}
