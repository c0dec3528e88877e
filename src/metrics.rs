// src/metrics.rs
use crate::document::Document;
use crate::pipeline::context::ExecutionContext;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Sink for execution counters and per-processor timings.
///
/// Called concurrently from every executing thread and from the watchdog thread.
pub trait MetricsTracker: Send + Sync {
    fn record_succeeded(&self, pipeline_id: &str, doc: &Document, duration_ns: u64);
    fn record_failed(&self, pipeline_id: &str, processor_name: &str, doc: &Document);
    fn record_dropped(&self, pipeline_id: &str, doc: &Document);
    /// `context.document` is the stuck record as it entered the pipeline
    fn record_overtime(&self, pipeline_id: &str, context: &ExecutionContext);
    fn record_processor_duration(&self, processor_name: &str, duration_ns: u64);

    fn total_processed(&self) -> u64;
    fn total_succeeded(&self) -> u64;
    fn total_failed(&self) -> u64;
    fn total_dropped(&self) -> u64;
    fn total_overtime(&self) -> u64;
    fn processor_stats(&self, processor_name: &str) -> Option<ProcessorStats>;
}

/// Timing aggregate for one processor type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub count: u64,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

impl ProcessorStats {
    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ns / self.count
        }
    }

    fn record(&mut self, duration_ns: u64) {
        if self.count == 0 || duration_ns < self.min_ns {
            self.min_ns = duration_ns;
        }
        if duration_ns > self.max_ns {
            self.max_ns = duration_ns;
        }
        self.count += 1;
        self.total_ns = self.total_ns.saturating_add(duration_ns);
    }
}

/// Point-in-time copy of all counters, suitable for printing as JSON
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dropped: u64,
    pub overtime: u64,
    pub failures_by_pipeline: BTreeMap<String, u64>,
    pub processors: BTreeMap<String, ProcessorStats>,
}

/// Lock-free counters plus one small lock per processor type
#[derive(Debug, Default)]
pub struct InMemoryMetricsTracker {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    overtime: AtomicU64,
    failures_by_pipeline: DashMap<String, AtomicU64>,
    processors: DashMap<String, Mutex<ProcessorStats>>,
}

impl InMemoryMetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures_for(&self, pipeline_id: &str) -> u64 {
        self.failures_by_pipeline
            .get(pipeline_id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.total_processed(),
            succeeded: self.total_succeeded(),
            failed: self.total_failed(),
            dropped: self.total_dropped(),
            overtime: self.total_overtime(),
            failures_by_pipeline: self
                .failures_by_pipeline
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            processors: self
                .processors
                .iter()
                .map(|e| (e.key().clone(), lock_stats(e.value())))
                .collect(),
        }
    }
}

fn lock_stats(stats: &Mutex<ProcessorStats>) -> ProcessorStats {
    *stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MetricsTracker for InMemoryMetricsTracker {
    fn record_succeeded(&self, _pipeline_id: &str, _doc: &Document, _duration_ns: u64) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self, pipeline_id: &str, _processor_name: &str, _doc: &Document) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.failures_by_pipeline
            .entry(pipeline_id.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self, _pipeline_id: &str, _doc: &Document) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_overtime(&self, _pipeline_id: &str, _context: &ExecutionContext) {
        self.overtime.fetch_add(1, Ordering::Relaxed);
    }

    fn record_processor_duration(&self, processor_name: &str, duration_ns: u64) {
        if let Some(stats) = self.processors.get(processor_name) {
            stats
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .record(duration_ns);
            return;
        }
        self.processors
            .entry(processor_name.to_string())
            .or_default()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record(duration_ns);
    }

    fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn total_succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    fn total_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn total_overtime(&self) -> u64 {
        self.overtime.load(Ordering::Relaxed)
    }

    fn processor_stats(&self, processor_name: &str) -> Option<ProcessorStats> {
        self.processors.get(processor_name).map(|s| lock_stats(s.value()))
    }
}
