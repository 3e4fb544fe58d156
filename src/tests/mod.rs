use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::Method;

use crate::connection::{Attempt, Response, Throttle, Transport};
use crate::dictionary::Dictionary;
use crate::fuzzer::{Fuzzer, FuzzerError, RunState};
use crate::output::{ReportError, ReportSink};
use crate::prober::{ProbeOptions, Prober};
use crate::reporter::Reporter;

/// In-memory writer shared between a console and the test body.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SinkLog {
    paths: Vec<(u16, String)>,
    saved: bool,
    closed: bool,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingSink(Arc<Mutex<SinkLog>>);

impl RecordingSink {
    pub(crate) fn paths(&self) -> Vec<(u16, String)> {
        self.0.lock().unwrap().paths.clone()
    }

    pub(crate) fn saved(&self) -> bool {
        self.0.lock().unwrap().saved
    }

    pub(crate) fn closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

impl ReportSink for RecordingSink {
    fn add_path(&mut self, status: u16, path: &str, _content_length: Option<u64>) {
        self.0.lock().unwrap().paths.push((status, path.to_string()));
    }

    fn save(&mut self) -> Result<(), ReportError> {
        self.0.lock().unwrap().saved = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReportError> {
        self.0.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Answers every request with the same status after an optional delay.
pub(crate) struct FixedTransport {
    status: u16,
    delay: Duration,
    sent: AtomicUsize,
}

impl FixedTransport {
    pub(crate) fn new(status: u16) -> Self {
        Self::with_delay(status, Duration::ZERO)
    }

    pub(crate) fn with_delay(status: u16, delay: Duration) -> Self {
        Self {
            status,
            delay,
            sent: AtomicUsize::new(0),
        }
    }

    pub(crate) fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl Transport for FixedTransport {
    fn send(&self, _method: &Method, _url: &str) -> Attempt {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Attempt::Response(Response::with_status(self.status))
    }
}

/// Records every URL and sleeps a random few microseconds per request.
#[derive(Default)]
struct RecordingTransport {
    urls: Mutex<Vec<String>>,
    max_jitter_us: u64,
}

impl Transport for RecordingTransport {
    fn send(&self, _method: &Method, url: &str) -> Attempt {
        if self.max_jitter_us > 0 {
            let us = rand::thread_rng().gen_range(0..self.max_jitter_us);
            thread::sleep(Duration::from_micros(us));
        }
        self.urls.lock().unwrap().push(url.to_string());
        Attempt::Response(Response::with_status(200))
    }
}

/// Per-path behaviour: a status, a transient failure, or a panic.
enum Scripted {
    Status(u16),
    Flaky,
    Panic,
}

struct PathTransport {
    routes: HashMap<String, Scripted>,
}

impl Transport for PathTransport {
    fn send(&self, _method: &Method, url: &str) -> Attempt {
        let path = url.rsplit('/').next().unwrap_or_default();
        match self.routes.get(path) {
            Some(Scripted::Status(status)) => Attempt::Response(Response::with_status(*status)),
            Some(Scripted::Flaky) => Attempt::Retryable {
                reason: "connection reset by peer".to_string(),
            },
            Some(Scripted::Panic) => panic!("transport blew up on {path}"),
            None => Attempt::Response(Response::with_status(200)),
        }
    }
}

const BASE: &str = "http://example.com:80/";

fn words(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("entry-{i}")).collect()
}

fn build(
    threads: usize,
    entries: Vec<String>,
    transport: Arc<dyn Transport>,
    options: ProbeOptions,
) -> Fuzzer {
    Fuzzer::new(
        threads,
        Arc::new(Dictionary::from_entries(entries)),
        Arc::new(Prober::new(transport, options)),
        Arc::new(Reporter::silent()),
    )
    .unwrap()
}

fn urls_for(entries: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = entries.iter().map(|e| format!("{BASE}{e}")).collect();
    urls.sort();
    urls
}

#[test]
fn every_entry_is_claimed_exactly_once_for_any_worker_count() {
    let entries = words(500);
    for threads in [1, 2, 7, 16, 64] {
        let transport = Arc::new(RecordingTransport::default());
        let fuzzer = build(
            threads,
            entries.clone(),
            transport.clone(),
            ProbeOptions::new(BASE),
        );
        fuzzer.start().unwrap();
        fuzzer.wait();

        let mut sent = transport.urls.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, urls_for(&entries), "threads={threads}");
        assert_eq!(fuzzer.dictionary().claimed(), entries.len());
        assert_eq!(fuzzer.state(), RunState::Exhausted);
    }
}

#[test]
fn no_entry_is_lost_with_many_workers_and_random_delays() {
    let entries = words(10_000);
    let transport = Arc::new(RecordingTransport {
        max_jitter_us: 200,
        ..Default::default()
    });
    let fuzzer = build(50, entries.clone(), transport.clone(), ProbeOptions::new(BASE));
    fuzzer.start().unwrap();
    fuzzer.wait();

    let sent = transport.urls.lock().unwrap().clone();
    assert_eq!(sent.len(), entries.len());
    let unique: HashSet<&String> = sent.iter().collect();
    assert_eq!(unique.len(), entries.len());
    assert_eq!(fuzzer.reporter().findings().len(), entries.len());
}

#[test]
fn empty_wordlist_completes_without_findings() {
    for threads in [1, 8] {
        let transport = Arc::new(FixedTransport::new(200));
        let fuzzer = build(threads, Vec::new(), transport.clone(), ProbeOptions::new(BASE));
        let started = Instant::now();
        fuzzer.start().unwrap();
        fuzzer.wait();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(fuzzer.state(), RunState::Exhausted);
        assert!(fuzzer.reporter().findings().is_empty());
        assert_eq!(fuzzer.reporter().error_count(), 0);
        assert_eq!(transport.sent(), 0);
    }
}

#[test]
fn stop_drains_workers_within_one_probe() {
    let delay = Duration::from_millis(50);
    let max_retries = 2;
    let transport = Arc::new(FixedTransport::with_delay(200, delay));
    let mut options = ProbeOptions::new(BASE);
    options.max_retries = max_retries;
    let fuzzer = Arc::new(build(4, words(1_000), transport.clone(), options));

    fuzzer.start().unwrap();
    thread::sleep(Duration::from_millis(120));

    let stopper = {
        let fuzzer = fuzzer.clone();
        thread::spawn(move || {
            let started = Instant::now();
            fuzzer.stop();
            started.elapsed()
        })
    };
    let stop_took = stopper.join().unwrap();

    let bound = delay * (max_retries + 1) + Duration::from_millis(500);
    assert!(stop_took < bound, "stop took {stop_took:?}");
    assert_eq!(fuzzer.state(), RunState::UserStopped);

    let started = Instant::now();
    fuzzer.wait();
    assert!(started.elapsed() < Duration::from_millis(50));

    let sent_after_stop = transport.sent();
    assert!(sent_after_stop < 1_000);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(transport.sent(), sent_after_stop);
}

#[test]
fn stop_releases_workers_parked_on_the_rate_limit() {
    let transport = Arc::new(FixedTransport::new(200));
    let mut options = ProbeOptions::new(BASE);
    options.throttle = Throttle::new(Duration::ZERO, Some(2));
    let fuzzer = Arc::new(build(20, words(1_000), transport.clone(), options));

    fuzzer.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    let sent_before_stop = transport.sent();

    let started = Instant::now();
    fuzzer.stop();
    let stop_took = started.elapsed();
    assert!(stop_took < Duration::from_millis(500), "stop took {stop_took:?}");
    assert_eq!(fuzzer.state(), RunState::UserStopped);

    let sent_after_stop = transport.sent();
    assert!(
        sent_after_stop <= sent_before_stop + 1,
        "before={sent_before_stop} after={sent_after_stop}"
    );
    thread::sleep(Duration::from_millis(600));
    assert_eq!(transport.sent(), sent_after_stop);

    let started = Instant::now();
    fuzzer.wait();
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn stop_and_wait_from_different_threads_both_return() {
    let transport = Arc::new(FixedTransport::with_delay(200, Duration::from_millis(20)));
    let fuzzer = Arc::new(build(3, words(500), transport, ProbeOptions::new(BASE)));
    fuzzer.start().unwrap();

    let waiter = {
        let fuzzer = fuzzer.clone();
        thread::spawn(move || fuzzer.wait())
    };
    thread::sleep(Duration::from_millis(50));
    fuzzer.stop();
    waiter.join().unwrap();
    assert_eq!(fuzzer.state(), RunState::UserStopped);
}

#[test]
fn start_while_running_is_rejected() {
    let transport = Arc::new(FixedTransport::with_delay(200, Duration::from_millis(20)));
    let fuzzer = build(2, words(200), transport, ProbeOptions::new(BASE));
    fuzzer.start().unwrap();
    assert!(matches!(fuzzer.start(), Err(FuzzerError::AlreadyRunning)));
    fuzzer.stop();
}

#[test]
fn restart_after_exhaustion_probes_everything_again() {
    let entries = words(40);
    let transport = Arc::new(FixedTransport::new(200));
    let fuzzer = build(4, entries.clone(), transport.clone(), ProbeOptions::new(BASE));

    fuzzer.start().unwrap();
    fuzzer.wait();
    assert_eq!(fuzzer.reporter().findings().len(), entries.len());

    fuzzer.start().unwrap();
    fuzzer.wait();
    assert_eq!(transport.sent(), entries.len() * 2);
    assert_eq!(fuzzer.reporter().findings().len(), entries.len());
    assert_eq!(fuzzer.state(), RunState::Exhausted);
}

#[test]
fn restart_after_user_stop_is_allowed() {
    let transport = Arc::new(FixedTransport::with_delay(200, Duration::from_millis(5)));
    let fuzzer = build(2, words(300), transport, ProbeOptions::new(BASE));
    fuzzer.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    fuzzer.stop();
    fuzzer.start().unwrap();
    fuzzer.wait();
    assert_eq!(fuzzer.state(), RunState::Exhausted);
    assert_eq!(fuzzer.reporter().findings().len(), 300);
}

#[test]
fn failing_worker_does_not_stop_siblings() {
    let mut entries = words(50);
    entries.push("broken".to_string());
    let transport = Arc::new(PathTransport {
        routes: HashMap::from([("broken".to_string(), Scripted::Flaky)]),
    });
    let mut options = ProbeOptions::new(BASE);
    options.max_retries = 1;
    let fuzzer = build(3, entries, transport, options);

    fuzzer.start().unwrap();
    fuzzer.wait();

    assert_eq!(fuzzer.reporter().error_count(), 1);
    assert_eq!(fuzzer.reporter().findings().len(), 50);
    assert_eq!(fuzzer.state(), RunState::Exhausted);
}

#[test]
fn wait_returns_when_every_worker_dies() {
    let entries = words(100);
    let routes = entries
        .iter()
        .map(|e| (e.clone(), Scripted::Flaky))
        .collect();
    let transport = Arc::new(PathTransport { routes });
    let mut options = ProbeOptions::new(BASE);
    options.max_retries = 1;
    let fuzzer = build(4, entries, transport, options);

    fuzzer.start().unwrap();
    fuzzer.wait();

    assert_eq!(fuzzer.reporter().error_count(), 4);
    assert!(fuzzer.reporter().findings().is_empty());
    assert!(fuzzer.state().is_terminal());
}

#[test]
fn panicking_worker_still_counts_as_finished() {
    let mut entries = words(20);
    entries.insert(0, "boom".to_string());
    let transport = Arc::new(PathTransport {
        routes: HashMap::from([("boom".to_string(), Scripted::Panic)]),
    });
    let fuzzer = build(2, entries, transport, ProbeOptions::new(BASE));

    fuzzer.start().unwrap();
    fuzzer.wait();

    assert_eq!(fuzzer.state(), RunState::Exhausted);
    assert_eq!(fuzzer.reporter().findings().len(), 20);
}

#[test]
fn noise_and_blacklisted_findings_are_suppressed() {
    let entries: Vec<String> = ["admin", "missing", "moved", "secret", "crash"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let transport = Arc::new(PathTransport {
        routes: HashMap::from([
            ("missing".to_string(), Scripted::Status(404)),
            ("moved".to_string(), Scripted::Status(301)),
            ("secret".to_string(), Scripted::Status(403)),
            ("crash".to_string(), Scripted::Status(503)),
        ]),
    });
    let mut options = ProbeOptions::new(BASE);
    options.blacklist.insert(403, "secret");
    options.policy = crate::prober::StatusPolicy::new(true);
    let fuzzer = build(2, entries, transport, options);

    fuzzer.start().unwrap();
    fuzzer.wait();

    let found: Vec<String> = fuzzer
        .reporter()
        .findings()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(found, vec!["admin".to_string()]);
}

#[test]
fn findings_reach_attached_sinks_once() {
    let transport = Arc::new(FixedTransport::new(200));
    let fuzzer = build(8, words(64), transport, ProbeOptions::new(BASE));
    let sink = RecordingSink::default();
    fuzzer.reporter().attach(Box::new(sink.clone()));

    fuzzer.start().unwrap();
    fuzzer.wait();
    fuzzer.reporter().finish().unwrap();

    let mut paths: Vec<String> = sink.paths().into_iter().map(|(_, p)| p).collect();
    paths.sort();
    let mut expected = words(64);
    expected.sort();
    assert_eq!(paths, expected);
    assert!(sink.saved() && sink.closed());
}
