// src/watchdog.rs
//
// Overtime detection without per-document timers. In-flight executions live in
// a ring of `buckets` time slices; each tick retires the oldest slice and
// reports whatever is still in it. Detection is advisory: nothing is cancelled.
use crate::error::ConfigurationError;
use crate::metrics::MetricsTracker;
use crate::pipeline::config::WatchdogConfig;
use crate::pipeline::context::ExecutionContext;
use crossbeam_channel::{select, tick, Sender};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

type Bucket = DashMap<u64, Arc<ExecutionContext>>;

pub type OvertimeCallback = Box<dyn Fn(&ExecutionContext) + Send + Sync>;

struct WatchdogState {
    config: WatchdogConfig,
    buckets: RwLock<VecDeque<Arc<Bucket>>>,
    metrics: Arc<dyn MetricsTracker>,
    on_overtime: OvertimeCallback,
    reported: AtomicU64,
}

impl WatchdogState {
    /// Insert into the newest bucket while holding the ring's read lock, so a
    /// concurrent `rotate` cannot retire that bucket between lookup and insert.
    fn register(&self, context: Arc<ExecutionContext>) -> Arc<Bucket> {
        let buckets = self.buckets.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = match buckets.back() {
            Some(bucket) => Arc::clone(bucket),
            // The ring always holds `config.buckets` >= 1 entries
            None => Arc::new(Bucket::new()),
        };
        bucket.insert(context.execution_id, context);
        bucket
    }

    fn rotate(&self) -> usize {
        let oldest = {
            let mut buckets = self.buckets.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            buckets.push_back(Arc::new(Bucket::new()));
            buckets.pop_front()
        };

        let Some(oldest) = oldest else {
            return 0;
        };

        // Claim each entry with `remove` so an execution finishing concurrently
        // is either reported here or deregistered there, never both.
        let ids: Vec<u64> = oldest.iter().map(|entry| *entry.key()).collect();
        let mut reported = 0;
        for id in ids {
            if let Some((_, context)) = oldest.remove(&id) {
                self.report(&context);
                reported += 1;
            }
        }
        reported
    }

    fn report(&self, context: &ExecutionContext) {
        tracing::warn!(
            "Execution {} of pipeline '{}' exceeded {:?} (in flight for {:?}): {}",
            context.execution_id,
            context.pipeline_id,
            self.config.threshold(),
            context.elapsed(),
            serde_json::to_string(context.document.as_ref()).unwrap_or_default()
        );
        self.reported.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_overtime(&context.pipeline_id, context);
        (self.on_overtime)(context);
    }

    fn in_flight(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.iter().map(|bucket| bucket.len()).sum()
    }
}

struct Ticker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Background detector of executions running longer than `slice * buckets`
pub struct ExecutionWatchdog {
    state: Arc<WatchdogState>,
    ticker: Mutex<Option<Ticker>>,
}

impl ExecutionWatchdog {
    /// Create a watchdog. The ticker thread is not running until `start`.
    pub fn new(
        config: WatchdogConfig,
        metrics: Arc<dyn MetricsTracker>,
        on_overtime: impl Fn(&ExecutionContext) + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let buckets = (0..config.buckets).map(|_| Arc::new(Bucket::new())).collect();
        Ok(ExecutionWatchdog {
            state: Arc::new(WatchdogState {
                config,
                buckets: RwLock::new(buckets),
                metrics,
                on_overtime: Box::new(on_overtime),
                reported: AtomicU64::new(0),
            }),
            ticker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> WatchdogConfig {
        self.state.config
    }

    /// Spawn the ticker thread. Calling `start` twice is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        let mut ticker = self.ticker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ticker.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let state = Arc::clone(&self.state);
        let slice = state.config.slice;

        let handle = thread::Builder::new()
            .name("sawlog-watchdog".to_string())
            .spawn(move || {
                let ticks = tick(slice);
                loop {
                    select! {
                        recv(ticks) -> _ => {
                            state.rotate();
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("Watchdog ticker stopped");
            })?;

        tracing::debug!(
            "Watchdog started: {} buckets of {:?} (threshold {:?})",
            self.state.config.buckets,
            slice,
            self.state.config.threshold()
        );
        *ticker = Some(Ticker {
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop the ticker thread and wait for it to exit
    pub fn shutdown(&self) {
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(ticker) = ticker {
            drop(ticker.shutdown);
            if ticker.handle.join().is_err() {
                tracing::error!("Watchdog ticker thread panicked");
            }
        }
    }

    /// Register an execution in the newest bucket. It stays tracked until the
    /// returned handle is dropped.
    pub fn track(&self, context: Arc<ExecutionContext>) -> TrackedExecution {
        let id = context.execution_id;
        let bucket = self.state.register(context);
        TrackedExecution { bucket, id }
    }

    /// Run one tick by hand: retire the oldest bucket and report what is left in it.
    /// Returns the number of executions reported.
    pub fn rotate(&self) -> usize {
        self.state.rotate()
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight()
    }

    /// Total overtime reports since creation
    pub fn reported(&self) -> u64 {
        self.state.reported.load(Ordering::Relaxed)
    }
}

impl Drop for ExecutionWatchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Deregisters its execution from the watchdog when dropped
pub struct TrackedExecution {
    bucket: Arc<Bucket>,
    id: u64,
}

impl TrackedExecution {
    pub fn execution_id(&self) -> u64 {
        self.id
    }
}

impl Drop for TrackedExecution {
    fn drop(&mut self) {
        self.bucket.remove(&self.id);
    }
}
