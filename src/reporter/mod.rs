//! Collects findings from every worker and surfaces each path once.

pub mod console;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::output::{ReportError, ReportSink};
use crate::prober::{ProbeError, ProbeResult};

pub use console::{Console, OutputSettings};

/// A response worth showing to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub path: String,
    pub status: u16,
    pub location: Option<String>,
    pub content_length: Option<u64>,
}

impl From<ProbeResult> for Finding {
    fn from(result: ProbeResult) -> Self {
        Self {
            path: result.path,
            status: result.response.status,
            location: result.response.location,
            content_length: result.response.content_length,
        }
    }
}

#[derive(Default)]
struct ReportState {
    seen: HashSet<String>,
    findings: Vec<Finding>,
    sinks: Vec<Box<dyn ReportSink>>,
}

pub struct Reporter {
    console: Console,
    state: Mutex<ReportState>,
    errors: AtomicUsize,
}

impl Reporter {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            state: Mutex::new(ReportState::default()),
            errors: AtomicUsize::new(0),
        }
    }

    /// Reporter that prints nothing. Findings are still recorded.
    pub fn silent() -> Self {
        let settings = OutputSettings {
            quiet: true,
            ..OutputSettings::plain()
        };
        Self::new(Console::new(settings, Box::new(std::io::sink())))
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attach(&self, sink: Box<dyn ReportSink>) {
        self.state().sinks.push(sink);
    }

    /// Forgets what was reported so a new run starts clean. Sinks keep their data.
    pub fn begin_run(&self) {
        let mut state = self.state();
        state.seen.clear();
        state.findings.clear();
        self.errors.store(0, Ordering::Relaxed);
    }

    /// Emits `finding` unless its path was already reported in this run.
    pub fn report(&self, finding: Finding) -> bool {
        let mut state = self.state();
        if !state.seen.insert(finding.path.clone()) {
            debug!(path = %finding.path, "duplicate finding dropped");
            return false;
        }

        self.console.finding(&finding);
        for sink in state.sinks.iter_mut() {
            sink.add_path(finding.status, &finding.path, finding.content_length);
        }
        state.findings.push(finding);
        true
    }

    /// Best-effort progress update; never blocks a worker.
    pub fn progress(&self, path: &str, position: usize, total: usize) {
        self.console.progress(path, position, total);
    }

    pub fn error(&self, err: &ProbeError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(path = err.path(), error = %err, "worker stopped");
        self.console.error(&err.to_string());
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.state().findings.clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Saves and closes every sink and clears the progress line.
    ///
    /// All sinks are attempted; the first failure is returned.
    pub fn finish(&self) -> Result<(), ReportError> {
        self.console.finish();
        let mut first_err = None;
        for sink in self.state().sinks.iter_mut() {
            if let Err(e) = sink.save().and_then(|_| sink.close()) {
                warn!(error = %e, "report sink failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
