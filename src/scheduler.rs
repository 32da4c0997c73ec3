//! Fan-out of (subject, test case) pairs onto worker threads.
//!
//! Each applicable pair runs on its own scoped thread. Pairs of one subject
//! are started together as a batch; `max_batches` optionally bounds how many
//! subject batches are in flight. Workers send results over an MPSC channel
//! to a single collector thread, which owns the result list. The coordinator
//! joins every worker, drops its sender, and then joins the collector, so
//! the channel disconnecting is the "all work consumed" signal.
//!
//! Progress reporting goes through a [`RunObserver`] on its own thread, fed
//! with `try_send` so a slow observer loses events instead of stalling runs.

use crate::runner::{Runner, TestRunResult};
use crate::status::Status;
use crate::testcase::{TestCase, TestSuite};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Buffered observer events before new ones are dropped.
const OBSERVER_BUFFER: usize = 1024;

/// Receives best-effort progress notifications from the scheduler.
///
/// All methods have no-op defaults. Notifications may be dropped under load;
/// an observer must never be used to build the report.
pub trait RunObserver: Send {
    /// Called once before any test runs, with the number of pairs scheduled.
    fn on_start(&mut self, total: usize) {
        let _ = total;
    }

    /// Called as each result arrives, in completion order.
    fn on_result(&mut self, result: &TestRunResult) {
        let _ = result;
    }

    /// Called after every result has been collected.
    fn on_finish(&mut self, completed: usize, elapsed: Duration) {
        let _ = (completed, elapsed);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {}

/// Observer that logs each result through `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver {
    total: usize,
    seen: usize,
}

impl RunObserver for LogObserver {
    fn on_start(&mut self, total: usize) {
        self.total = total;
        tracing::info!(total, "starting test runs");
    }

    fn on_result(&mut self, result: &TestRunResult) {
        self.seen += 1;
        tracing::debug!(
            subject = %result.subject,
            suite = %result.suite,
            index = result.index,
            summary = %result.summary,
            "test {} of {}",
            self.seen,
            self.total
        );
    }

    fn on_finish(&mut self, completed: usize, elapsed: Duration) {
        tracing::info!(completed, elapsed_ms = elapsed.as_millis() as u64, "test runs finished");
    }
}

/// Progress bar over all scheduled pairs.
#[cfg(feature = "progress")]
pub struct ProgressObserver {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "progress")]
impl ProgressObserver {
    pub fn new() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }
}

#[cfg(feature = "progress")]
impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress")]
impl RunObserver for ProgressObserver {
    fn on_start(&mut self, total: usize) {
        self.bar = indicatif::ProgressBar::new(total as u64);
        if let Ok(style) = indicatif::ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
            self.bar.set_style(style);
        }
    }

    fn on_result(&mut self, result: &TestRunResult) {
        self.bar.set_message(result.subject.clone());
        self.bar.inc(1);
    }

    fn on_finish(&mut self, _completed: usize, _elapsed: Duration) {
        self.bar.finish_and_clear();
    }
}

enum ObserverEvent {
    Start(usize),
    Result(Box<TestRunResult>),
    Finish(usize, Duration),
}

/// Concurrency coordinator for a batch of test runs.
pub struct Scheduler<'a> {
    runner: &'a dyn Runner,
    max_batches: Option<usize>,
}

impl<'a> Scheduler<'a> {
    pub fn new(runner: &'a dyn Runner) -> Self {
        Self {
            runner,
            max_batches: None,
        }
    }

    /// Limit how many subject batches may run at once.
    pub fn max_batches(mut self, limit: Option<usize>) -> Self {
        self.max_batches = limit.filter(|&n| n > 0);
        self
    }

    /// Run every test case of every suite against every subject.
    ///
    /// Returns once every result has been collected, in completion order.
    /// Pairs whose test does not apply to the subject are resolved as
    /// [`Status::FilenameMismatch`] without a worker.
    pub fn run(
        &self,
        subjects: &[String],
        suites: &[TestSuite],
        observer: Box<dyn RunObserver>,
    ) -> Vec<TestRunResult> {
        let started = Instant::now();
        let cases: Vec<&TestCase> = suites.iter().flat_map(|s| s.cases()).collect();
        let total = subjects.len() * cases.len();

        let (event_tx, event_rx) = mpsc::sync_channel::<ObserverEvent>(OBSERVER_BUFFER);
        let observer_handle = spawn_observer(observer, event_rx);
        let _ = event_tx.try_send(ObserverEvent::Start(total));

        let results = thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<TestRunResult>();

            let collector_events = event_tx.clone();
            let collector = scope.spawn(move || {
                let mut results = Vec::new();
                for result in rx {
                    let _ = collector_events.try_send(ObserverEvent::Result(Box::new(result.clone())));
                    results.push(result);
                }
                results
            });

            let mut in_flight = VecDeque::new();
            for subject in subjects {
                if let Some(limit) = self.max_batches {
                    while in_flight.len() >= limit {
                        if let Some(batch) = in_flight.pop_front() {
                            join_batch(batch);
                        }
                    }
                }

                let mut batch = Vec::new();
                for case in &cases {
                    let case: &TestCase = *case;
                    if !case.applies_to(subject) {
                        let _ = tx.send(TestRunResult::new(subject, case, Status::FilenameMismatch));
                        continue;
                    }

                    let worker_tx = tx.clone();
                    let runner = self.runner;
                    let spawned = thread::Builder::new()
                        .name(format!("tst-{}", case.id))
                        .spawn_scoped(scope, move || {
                            let _ = worker_tx.send(runner.run(subject, case));
                        });
                    match spawned {
                        Ok(handle) => batch.push(handle),
                        Err(e) => {
                            tracing::warn!(error = %e, test = %case.id, "cannot spawn worker thread, running inline");
                            let _ = tx.send(self.runner.run(subject, case));
                        }
                    }
                }
                tracing::debug!(subject = %subject, workers = batch.len(), "started subject batch");
                in_flight.push_back(batch);
            }

            for batch in in_flight {
                join_batch(batch);
            }
            drop(tx);

            match collector.join() {
                Ok(results) => results,
                Err(_) => {
                    tracing::error!("result collector panicked");
                    Vec::new()
                }
            }
        });

        let _ = event_tx.try_send(ObserverEvent::Finish(results.len(), started.elapsed()));
        drop(event_tx);
        if let Some(handle) = observer_handle {
            if handle.join().is_err() {
                tracing::warn!("run observer panicked");
            }
        }

        results
    }
}

fn join_batch(batch: Vec<thread::ScopedJoinHandle<'_, ()>>) {
    for handle in batch {
        if handle.join().is_err() {
            tracing::warn!("test worker panicked; its slot stays unfilled");
        }
    }
}

fn spawn_observer(
    mut observer: Box<dyn RunObserver>,
    events: mpsc::Receiver<ObserverEvent>,
) -> Option<thread::JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name("tst-observer".to_string())
        .spawn(move || {
            for event in events {
                match event {
                    ObserverEvent::Start(total) => observer.on_start(total),
                    ObserverEvent::Result(result) => observer.on_result(&result),
                    ObserverEvent::Finish(completed, elapsed) => observer.on_finish(completed, elapsed),
                }
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "cannot spawn observer thread, progress disabled");
            None
        }
    }
}
