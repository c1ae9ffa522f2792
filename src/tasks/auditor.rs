//! Cache Auditor
//!
//! Background task that periodically runs an audit job (by default the
//! expiry sweep) against a store, and collects the errors the job reports.
//!
//! Lifecycle: `Idle` → `Running` on [`Auditor::start`], → `Stopped` on
//! [`Auditor::stop`]. `Stopped` is terminal.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::Store;
use crate::error::{CacheError, Result};
use crate::tasks::sweep;

/// A unit of audit work. Returns how many items it removed.
pub type AuditJob<V> = Arc<dyn Fn(&Store<V>) -> Result<usize> + Send + Sync>;

/// Callback that receives audit errors in place of the error queue.
pub type ErrorHandler = Arc<dyn Fn(CacheError) + Send + Sync>;

/// Smallest tick period accepted; tokio rejects a zero interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Observable lifecycle state of an [`Auditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditorState {
    Idle,
    Running,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running {
        shutdown_tx: watch::Sender<bool>,
        done_rx: watch::Receiver<bool>,
        handle: JoinHandle<()>,
    },
    /// Carries the loop's exit signal when the auditor had been running.
    Stopped { done_rx: Option<watch::Receiver<bool>> },
}

/// State shared between the auditor handle and its background task.
struct Reporter {
    errors_tx: mpsc::Sender<CacheError>,
    handler: Mutex<Option<ErrorHandler>>,
    dropped: AtomicU64,
    sweeps: AtomicU64,
    evicted: AtomicU64,
}

impl Reporter {
    /// Hands an error to the registered handler, or queues it.
    ///
    /// A full queue drops the new error.
    fn report(&self, err: CacheError) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(err))).is_err() {
                warn!("Audit error handler panicked");
            }
            return;
        }

        match self.errors_tx.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) | Err(TrySendError::Closed(err)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Audit error queue full, dropping error");
            }
        }
    }

    fn record(&self, outcome: &Result<usize>) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        if let Ok(removed) = outcome {
            self.evicted.fetch_add(*removed as u64, Ordering::Relaxed);
        }
    }
}

// == Auditor ==
/// Periodic, stoppable runner for an [`AuditJob`].
pub struct Auditor<V> {
    interval: Duration,
    delay: Duration,
    job: AuditJob<V>,
    lifecycle: Mutex<Lifecycle>,
    reporter: Arc<Reporter>,
    errors_rx: Mutex<mpsc::Receiver<CacheError>>,
}

impl<V: Send + Sync + 'static> Auditor<V> {
    // == Constructor ==
    /// Creates an idle auditor running the expiry sweep.
    ///
    /// # Arguments
    /// * `interval` - Time between sweeps
    /// * `delay` - Pause after each sweep before the next tick is awaited
    /// * `error_buffer` - Capacity of the error queue
    pub fn new(interval: Duration, delay: Duration, error_buffer: usize) -> Self {
        Self::with_job(interval, delay, error_buffer, Arc::new(sweep::expire_items::<V>))
    }

    /// Creates an idle auditor running a custom job.
    pub fn with_job(
        interval: Duration,
        delay: Duration,
        error_buffer: usize,
        job: AuditJob<V>,
    ) -> Self {
        let (errors_tx, errors_rx) = mpsc::channel(error_buffer.max(1));
        Self {
            interval: interval.max(MIN_INTERVAL),
            delay,
            job,
            lifecycle: Mutex::new(Lifecycle::Idle),
            reporter: Arc::new(Reporter {
                errors_tx,
                handler: Mutex::new(None),
                dropped: AtomicU64::new(0),
                sweeps: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
            }),
            errors_rx: Mutex::new(errors_rx),
        }
    }

    // == Start ==
    /// Spawns the audit loop on the current Tokio runtime.
    ///
    /// Starting a running auditor is a no-op, and so is starting a stopped
    /// one since `Stopped` is terminal.
    ///
    /// # Errors
    /// `RuntimeUnavailable` when called outside a Tokio runtime.
    pub fn start(&self, store: Arc<Store<V>>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running { .. } => {
                debug!("Auditor already running, start ignored");
                return Ok(());
            }
            Lifecycle::Stopped { .. } => {
                warn!("Auditor was stopped, start ignored");
                return Ok(());
            }
            Lifecycle::Idle => {}
        }

        let runtime = Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let handle = runtime.spawn(run_loop(
            store,
            Arc::clone(&self.job),
            Arc::clone(&self.reporter),
            self.interval,
            self.delay,
            shutdown_rx,
            done_tx,
        ));

        *lifecycle = Lifecycle::Running {
            shutdown_tx,
            done_rx,
            handle,
        };
        Ok(())
    }

    /// Runs the job once on the calling thread.
    ///
    /// The outcome is counted like a scheduled sweep but returned directly
    /// instead of going through the error queue.
    pub fn audit_now(&self, store: &Store<V>) -> Result<usize> {
        let outcome = run_job(&self.job, store);
        self.reporter.record(&outcome);
        outcome
    }
}

impl<V> Auditor<V> {
    // == Stop ==
    /// Signals the loop to exit and waits until it has.
    ///
    /// A sweep in progress finishes first. Every caller waits, including
    /// ones arriving after another caller already signalled the stop.
    /// Stopping an idle auditor moves it straight to `Stopped`.
    pub async fn stop(&self) {
        let (handle, mut done_rx) = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped { done_rx: None }) {
                Lifecycle::Idle => (None, None),
                Lifecycle::Running {
                    shutdown_tx,
                    done_rx,
                    handle,
                } => {
                    let _ = shutdown_tx.send(true);
                    *lifecycle = Lifecycle::Stopped {
                        done_rx: Some(done_rx.clone()),
                    };
                    (Some(handle), Some(done_rx))
                }
                Lifecycle::Stopped { done_rx } => {
                    *lifecycle = Lifecycle::Stopped {
                        done_rx: done_rx.clone(),
                    };
                    (None, done_rx)
                }
            }
        };

        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Auditor task ended abnormally");
            }
        } else if let Some(done_rx) = done_rx.as_mut() {
            // Err means the loop is gone without signalling, which is exit too
            let _ = done_rx.wait_for(|done| *done).await;
        }
    }

    /// Returns the lifecycle state. A loop that exited on its own reports
    /// `Stopped` even before `stop` is called.
    pub fn state(&self) -> AuditorState {
        match &*self.lifecycle.lock() {
            Lifecycle::Idle => AuditorState::Idle,
            Lifecycle::Running { handle, .. } if handle.is_finished() => AuditorState::Stopped,
            Lifecycle::Running { .. } => AuditorState::Running,
            Lifecycle::Stopped { .. } => AuditorState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == AuditorState::Running
    }

    // == Errors ==
    /// Drains up to `max` queued errors, oldest first, without waiting.
    pub fn collect_errors(&self, max: usize) -> Vec<CacheError> {
        let mut rx = self.errors_rx.lock();
        let mut errors = Vec::new();
        while errors.len() < max {
            match rx.try_recv() {
                Ok(err) => errors.push(err),
                Err(_) => break,
            }
        }
        errors
    }

    /// Routes future audit errors to `handler` instead of the queue.
    ///
    /// The handler runs on the auditor task and should return quickly.
    pub fn handle_errors<F>(&self, handler: F)
    where
        F: Fn(CacheError) + Send + Sync + 'static,
    {
        *self.reporter.handler.lock() = Some(Arc::new(handler));
    }

    /// Number of errors discarded because the queue was full.
    pub fn dropped_errors(&self) -> u64 {
        self.reporter.dropped.load(Ordering::Relaxed)
    }

    /// Number of completed job runs, successful or not.
    pub fn sweeps(&self) -> u64 {
        self.reporter.sweeps.load(Ordering::Relaxed)
    }

    /// Total items the job reported as removed.
    pub fn evicted(&self) -> u64 {
        self.reporter.evicted.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<V> Drop for Auditor<V> {
    fn drop(&mut self) {
        if let Lifecycle::Running { shutdown_tx, .. } = &*self.lifecycle.lock() {
            let _ = shutdown_tx.send(true);
        }
    }
}

impl<V> fmt::Debug for Auditor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auditor")
            .field("interval", &self.interval)
            .field("delay", &self.delay)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Runs the job, turning a panic into an audit error.
fn run_job<V>(job: &AuditJob<V>, store: &Store<V>) -> Result<usize> {
    panic::catch_unwind(AssertUnwindSafe(|| job(store)))
        .unwrap_or_else(|_| Err(CacheError::Audit("audit job panicked".to_string())))
}

/// Runs the job on the blocking pool so a long sweep never stalls the
/// runtime's worker threads.
async fn run_job_blocking<V>(job: &AuditJob<V>, store: &Arc<Store<V>>) -> Result<usize>
where
    V: Send + Sync + 'static,
{
    let job = Arc::clone(job);
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || run_job(&job, &store))
        .await
        .unwrap_or_else(|err| Err(CacheError::Audit(format!("audit job aborted: {err}"))))
}

async fn run_loop<V>(
    store: Arc<Store<V>>,
    job: AuditJob<V>,
    reporter: Arc<Reporter>,
    interval: Duration,
    delay: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
) where
    V: Send + Sync + 'static,
{
    info!(?interval, ?delay, "Starting cache auditor");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first sweep waits one interval
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = run_job_blocking(&job, &store).await;
                reporter.record(&outcome);
                match outcome {
                    Ok(0) => debug!("Audit: no expired items"),
                    Ok(removed) => info!(removed, "Audit: removed expired items"),
                    Err(err) => {
                        warn!(error = %err, "Audit job failed");
                        reporter.report(err);
                    }
                }

                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.changed() => {}
                    }
                }
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Cache auditor stopped");
    let _ = done_tx.send(true);
}
