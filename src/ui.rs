use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
    Quiet,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    /// Silent UI for library callers and tests.
    pub fn quiet() -> Self {
        Self::new(UiMode::Quiet, false)
    }

    pub fn from_args(ui_flag: Option<&str>, quiet: bool, is_tty: bool) -> Self {
        let mode = if quiet {
            UiMode::Quiet
        } else {
            match ui_flag {
                Some("plain") => UiMode::Plain,
                Some("pretty") => UiMode::Pretty,
                _ => UiMode::Auto,
            }
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && matches!(self.mode, UiMode::Pretty | UiMode::Auto)
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.mode == UiMode::Quiet {
            return StageGuard::new(name.to_string(), None, false);
        }
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner), true)
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None, true)
        }
    }

    /// Read progress over `total` source frames (0 when the container does not say).
    pub fn frames(&self, label: &str, total: u64) -> FrameProgress {
        match self.mode {
            UiMode::Quiet => FrameProgress::hidden(),
            _ if self.use_pretty() => {
                let bar = if total > 0 {
                    ProgressBar::new(total)
                } else {
                    ProgressBar::new_spinner()
                };
                bar.set_draw_target(ProgressDrawTarget::stderr());
                let template = if total > 0 {
                    "{msg} [{bar:40}] {pos}/{len} frames ({elapsed})"
                } else {
                    "{spinner} {msg} {pos} frames ({elapsed})"
                };
                let style = ProgressStyle::with_template(template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> ");
                bar.set_style(style);
                bar.set_message(label.to_string());
                FrameProgress {
                    bar: Some(bar),
                    plain: false,
                    total,
                    last_reported: 0,
                }
            }
            _ => FrameProgress {
                bar: None,
                plain: true,
                total,
                last_reported: 0,
            },
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    report: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>, report: bool) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            report,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if !self.report {
            return;
        }
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Current/total frame counter for one playback pass.
pub struct FrameProgress {
    bar: Option<ProgressBar>,
    plain: bool,
    total: u64,
    last_reported: u64,
}

/// Plain mode prints one line per this many frames.
const PLAIN_REPORT_EVERY: u64 = 100;

impl FrameProgress {
    pub fn hidden() -> Self {
        Self {
            bar: None,
            plain: false,
            total: 0,
            last_reported: 0,
        }
    }

    pub fn update(&mut self, current: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(current);
        } else if self.plain && current >= self.last_reported + PLAIN_REPORT_EVERY {
            self.last_reported = current;
            if self.total > 0 {
                eprintln!("    frame {}/{}", current, self.total);
            } else {
                eprintln!("    frame {}", current);
            }
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_flag_wins_over_ui_mode() {
        let ui = Ui::from_args(Some("pretty"), true, true);
        assert_eq!(ui.mode, UiMode::Quiet);
    }

    #[test]
    fn non_tty_never_draws_bars() {
        let ui = Ui::from_args(Some("pretty"), false, false);
        assert!(!ui.use_pretty());
        let progress = ui.frames("reading", 10);
        assert!(progress.bar.is_none());
    }

    #[test]
    fn format_duration_switches_units() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
