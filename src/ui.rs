//! Terminal feedback for the command-line tools.
//!
//! Everything is drawn on stderr so stdout stays reserved for the JSON result.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame progress. `total` is the source's frame-count hint; without one the
    /// bar degrades to a running counter.
    pub fn frames(&self, total: Option<u64>) -> FrameProgress {
        if !self.pretty() {
            return FrameProgress {
                bar: None,
                last_logged: 0,
            };
        }
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                let style = ProgressStyle::with_template(
                    "{bar:32.green/dim} {pos}/{len} frames ({per_sec}, eta {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar());
                bar.set_style(style);
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                let style = ProgressStyle::with_template("{spinner} {pos} frames ({per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner());
                bar.set_style(style);
                bar
            }
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        FrameProgress {
            bar: Some(bar),
            last_logged: 0,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Plain mode reports every this many frames.
const PLAIN_REPORT_INTERVAL: u64 = 100;

pub struct FrameProgress {
    bar: Option<ProgressBar>,
    last_logged: u64,
}

impl FrameProgress {
    pub fn update(&mut self, done: u64, total: Option<u64>) {
        match &self.bar {
            Some(bar) => {
                if let Some(total) = total {
                    if bar.length() != Some(total) {
                        bar.set_length(total);
                    }
                }
                bar.set_position(done);
            }
            None => {
                if done >= self.last_logged + PLAIN_REPORT_INTERVAL {
                    self.last_logged = done;
                    match total {
                        Some(total) => eprintln!("    {}/{} frames", done, total),
                        None => eprintln!("    {} frames", done),
                    }
                }
            }
        }
    }
}

impl Drop for FrameProgress {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
