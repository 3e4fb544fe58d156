//! Fixed pool of worker threads draining one shared dictionary.
//!
//! Workers loop claim, probe, report until the dictionary runs dry or the
//! keep-running flag is cleared. A countdown of unfinished workers guarded by
//! its own mutex, paired with a condition variable, is the rendezvous for both
//! [`Fuzzer::stop`] and [`Fuzzer::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dictionary::{Claim, Dictionary};
use crate::prober::{ProbeError, Prober};
use crate::reporter::{Finding, Reporter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Exhausted,
    UserStopped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Exhausted | RunState::UserStopped)
    }
}

#[derive(Debug, Error)]
pub enum FuzzerError {
    #[error("at least one worker thread is required")]
    NoWorkers,

    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

struct RunInner {
    state: RunState,
    remaining: usize,
}

struct Shared {
    run: Mutex<RunInner>,
    finished: Condvar,
    keep_running: AtomicBool,
}

impl Shared {
    fn run(&self) -> MutexGuard<'_, RunInner> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_finished<'a>(&self, mut run: MutexGuard<'a, RunInner>) -> MutexGuard<'a, RunInner> {
        while run.remaining > 0 {
            run = self
                .finished
                .wait(run)
                .unwrap_or_else(|e| e.into_inner());
        }
        run
    }
}

/// Decrements the finisher count however the worker leaves its loop.
struct FinishGuard<'a> {
    shared: &'a Shared,
    id: usize,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        let mut run = self.shared.run();
        run.remaining = run.remaining.saturating_sub(1);
        if run.remaining == 0 && run.state == RunState::Running {
            run.state = RunState::Exhausted;
            info!("dictionary exhausted, all workers finished");
        }
        debug!(worker = self.id, remaining = run.remaining, "worker finished");
        self.shared.finished.notify_all();
    }
}

struct Worker {
    id: usize,
    dictionary: Arc<Dictionary>,
    prober: Arc<Prober>,
    reporter: Arc<Reporter>,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(self) {
        let _guard = FinishGuard {
            shared: &self.shared,
            id: self.id,
        };
        let total = self.dictionary.len();

        while self.shared.keep_running.load(Ordering::Acquire) {
            let (index, path) = match self.dictionary.claim_next() {
                Claim::Entry { index, path } => (index, path),
                Claim::Exhausted => break,
            };
            self.reporter.progress(&path, index + 1, total);

            match self.prober.probe(&path, &self.shared.keep_running) {
                Ok(result) => {
                    if self.prober.is_interesting(&result) {
                        self.reporter.report(Finding::from(result));
                    }
                }
                Err(ProbeError::Interrupted { .. }) => break,
                Err(e) => {
                    self.reporter.error(&e);
                    break;
                }
            }
        }
    }
}

pub struct Fuzzer {
    threads: usize,
    dictionary: Arc<Dictionary>,
    prober: Arc<Prober>,
    reporter: Arc<Reporter>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Fuzzer {
    pub fn new(
        threads: usize,
        dictionary: Arc<Dictionary>,
        prober: Arc<Prober>,
        reporter: Arc<Reporter>,
    ) -> Result<Self, FuzzerError> {
        if threads == 0 {
            return Err(FuzzerError::NoWorkers);
        }
        Ok(Self {
            threads,
            dictionary,
            prober,
            reporter,
            shared: Arc::new(Shared {
                run: Mutex::new(RunInner {
                    state: RunState::Idle,
                    remaining: 0,
                }),
                finished: Condvar::new(),
                keep_running: AtomicBool::new(false),
            }),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn state(&self) -> RunState {
        self.shared.run().state
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Launches a run over the whole dictionary.
    ///
    /// A fuzzer that reached a terminal state may be started again; the
    /// dictionary cursor and the reporter's seen paths are reset first.
    pub fn start(&self) -> Result<(), FuzzerError> {
        {
            let run = self.shared.run();
            if run.state == RunState::Running || run.remaining > 0 {
                return Err(FuzzerError::AlreadyRunning);
            }
        }
        self.join_workers();

        let mut run = self.shared.run();
        if run.state == RunState::Running || run.remaining > 0 {
            return Err(FuzzerError::AlreadyRunning);
        }
        self.dictionary.reset();
        self.reporter.begin_run();
        run.remaining = self.threads;
        run.state = RunState::Running;
        self.shared.keep_running.store(true, Ordering::Release);
        drop(run);

        info!(
            threads = self.threads,
            entries = self.dictionary.len(),
            "starting run"
        );

        let mut spawned = Vec::with_capacity(self.threads);
        for id in 0..self.threads {
            let worker = Worker {
                id,
                dictionary: self.dictionary.clone(),
                prober: self.prober.clone(),
                reporter: self.reporter.clone(),
                shared: self.shared.clone(),
            };
            match thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run())
            {
                Ok(handle) => spawned.push(handle),
                Err(source) => {
                    warn!(worker = id, error = %source, "failed to spawn worker, rolling back");
                    self.rollback(spawned, self.threads - id);
                    return Err(FuzzerError::Spawn { source });
                }
            }
        }

        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(spawned);
        Ok(())
    }

    fn rollback(&self, spawned: Vec<JoinHandle<()>>, never_started: usize) {
        self.shared.keep_running.store(false, Ordering::Release);
        let mut run = self.shared.run();
        run.state = RunState::UserStopped;
        run.remaining = run.remaining.saturating_sub(never_started);
        let run = self.shared.wait_finished(run);
        drop(run);
        self.shared.finished.notify_all();
        for handle in spawned {
            let _ = handle.join();
        }
    }

    /// Stops a running fuzzer and blocks until every worker has exited.
    ///
    /// In-flight requests complete first, so shutdown takes at most one
    /// probe's worst-case retry duration. Does nothing unless running.
    pub fn stop(&self) {
        {
            let mut run = self.shared.run();
            if run.state != RunState::Running {
                return;
            }
            run.state = RunState::UserStopped;
            self.shared.keep_running.store(false, Ordering::Release);
            info!("stop requested, draining workers");

            let _run = self.shared.wait_finished(run);
            self.shared.finished.notify_all();
        }
        self.join_workers();
    }

    /// Blocks until the current run reaches a terminal state.
    pub fn wait(&self) {
        let run = self.shared.run();
        let _run = self.shared.wait_finished(run);
    }

    fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "worker panicked");
            }
        }
    }
}

impl Drop for Fuzzer {
    fn drop(&mut self) {
        self.stop();
        self.join_workers();
    }
}
