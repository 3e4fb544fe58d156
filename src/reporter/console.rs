use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use chrono::Local;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::Finding;
use crate::utils;

const PROGRESS_TEMPLATE: &str =
    ":: Progress: [{percent:>3}%] [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {wide_msg}";

/// Terminal behaviour, decided once by the caller.
#[derive(Clone, Copy, Debug)]
pub struct OutputSettings {
    pub colors: bool,
    pub progress: bool,
    /// Suppresses finding and error lines; the progress bar is unaffected.
    pub quiet: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            colors: true,
            progress: true,
            quiet: false,
        }
    }
}

impl OutputSettings {
    /// No colours, no progress bar. Used by library callers and tests.
    pub fn plain() -> Self {
        Self {
            colors: false,
            progress: false,
            quiet: false,
        }
    }
}

/// Finding log plus a single overwritten progress line.
///
/// Lines are written with the bar suspended, so the two never interleave.
pub struct Console {
    settings: OutputSettings,
    writer: Mutex<Box<dyn Write + Send>>,
    bar: ProgressBar,
    bar_gate: Mutex<()>,
}

impl Console {
    pub fn new(settings: OutputSettings, writer: Box<dyn Write + Send>) -> Self {
        let bar = if settings.progress {
            let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template(PROGRESS_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars(r#"#>-"#),
            );
            bar.enable_steady_tick(Duration::from_millis(200));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            settings,
            writer: Mutex::new(writer),
            bar,
            bar_gate: Mutex::new(()),
        }
    }

    pub fn stdout(settings: OutputSettings) -> Self {
        Self::new(settings, Box::new(io::stdout()))
    }

    pub fn settings(&self) -> OutputSettings {
        self.settings
    }

    fn writer(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> ColoredString) -> String {
        if self.settings.colors {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn emit(&self, line: &str) {
        self.bar.suspend(|| {
            let mut w = self.writer();
            // A closed stdout must not take a worker down with it.
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        });
    }

    pub fn line(&self, text: &str) {
        if !self.settings.quiet {
            self.emit(text);
        }
    }

    pub fn finding(&self, finding: &Finding) {
        if self.settings.quiet {
            return;
        }
        self.emit(&self.format_finding(finding));
    }

    pub fn error(&self, message: &str) {
        if self.settings.quiet {
            return;
        }
        let line = format!(
            "[{}] {} {}",
            Local::now().format("%H:%M:%S"),
            self.paint("ERR", |s| s.bold().red()),
            message
        );
        self.emit(&line);
    }

    pub(crate) fn format_finding(&self, finding: &Finding) -> String {
        let status = finding.status.to_string();
        let status = match finding.status {
            200..=299 => self.paint(&status, |s| s.bold().green()),
            401 | 403 => self.paint(&status, |s| s.bold().blue()),
            300..=399 => self.paint(&status, |s| s.bold().cyan()),
            500..=599 => self.paint(&status, |s| s.bold().red()),
            _ => self.paint(&status, |s| s.bold().yellow()),
        };
        let size = finding
            .content_length
            .map(utils::human_size)
            .unwrap_or_else(|| "-".to_string());

        let mut line = format!(
            "[{}] {} - {:>6} - /{}",
            Local::now().format("%H:%M:%S"),
            status,
            size,
            finding.path.trim_start_matches('/')
        );
        if let Some(location) = finding.location.as_deref() {
            line.push_str("  ->  ");
            line.push_str(&self.paint(location, |s| s.white()));
        }
        line
    }

    /// Updates the progress line unless another worker is already doing it.
    pub fn progress(&self, path: &str, position: usize, total: usize) {
        let _gate = match self.bar_gate.try_lock() {
            Ok(gate) => gate,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };
        self.bar.set_length(total as u64);
        self.bar.set_position(position as u64);
        self.bar.set_message(path.to_string());
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
