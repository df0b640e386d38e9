//! UI/Progress presentation layer
//!
//! This module handles:
//! - Progress bars for stages that walk a batch of objects
//! - Silent progress for `--quiet` and non-terminal output
//! - Coloured summaries (see [`display`])
//!
//! Progress is reported from worker threads during the manifest stage, so
//! every method takes `&self`.

pub mod display;

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::sequencer::Stage;

/// Progress reporter trait for stages over a batch
pub trait ProgressReporter: Send + Sync {
    /// A stage starts working through `total` objects
    fn start_stage(&self, stage: Stage, total: u64);

    /// One object is done, whatever its outcome
    fn object_done(&self, object: &str);

    /// The stage ran to the end
    fn finish_stage(&self);

    /// The stage was cut short
    fn abandon(&self);
}

/// Interactive progress reporter with one bar per stage
#[derive(Default)]
pub struct InteractiveProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl InteractiveProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressReporter for InteractiveProgressReporter {
    fn start_stage(&self, stage: Stage, total: u64) {
        let bar = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{prefix:>9} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(stage.to_string());
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn object_done(&self, object: &str) {
        // Truncate long names for display
        let display_name = if object.chars().count() > 40 {
            let tail: String = object
                .chars()
                .rev()
                .take(37)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("...{tail}")
        } else {
            object.to_string()
        };
        self.with_bar(|bar| {
            bar.set_message(display_name);
            bar.inc(1);
        });
    }

    fn finish_stage(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn abandon(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.abandon();
            }
        }
    }
}

/// No-op reporter for quiet mode and tests
#[derive(Default)]
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_stage(&self, _stage: Stage, _total: u64) {}

    fn object_done(&self, _object: &str) {}

    fn finish_stage(&self) {}

    fn abandon(&self) {}
}

/// Pick a reporter for the current terminal and flags
pub fn reporter(quiet: bool) -> Box<dyn ProgressReporter> {
    if quiet || !console::Term::stderr().is_term() {
        Box::new(SilentProgressReporter)
    } else {
        Box::new(InteractiveProgressReporter::new())
    }
}
