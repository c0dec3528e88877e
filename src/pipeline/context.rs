// src/pipeline/context.rs
use crate::error::ProcessorExecutionError;
use crate::document::Document;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_EXECUTION_ID: AtomicU64 = AtomicU64::new(1);

/// Result of running one processor against a document
#[derive(Debug)]
pub enum ProcessResult {
    /// Document mutated (or left alone) successfully
    Ok,
    /// Stop the pipeline and discard the document
    Drop,
    /// Processing error
    Error(ProcessorExecutionError),
}

impl ProcessResult {
    pub fn error(processor: &str, message: impl Into<String>) -> Self {
        ProcessResult::Error(ProcessorExecutionError::new(processor, message))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ProcessResult::Ok)
    }
}

/// Bookkeeping for one in-flight `execute` call.
///
/// `document` is the source as it entered the pipeline, so an overtime report
/// can name the record that is stuck.
#[derive(Debug)]
pub struct ExecutionContext {
    pub execution_id: u64,
    pub pipeline_id: String,
    pub ingest_timestamp: DateTime<Utc>,
    pub document: Arc<Map<String, Value>>,
    started: Instant,
}

impl ExecutionContext {
    pub fn new(pipeline_id: &str, doc: &Document) -> Self {
        ExecutionContext {
            execution_id: NEXT_EXECUTION_ID.fetch_add(1, Ordering::Relaxed),
            pipeline_id: pipeline_id.to_string(),
            ingest_timestamp: Utc::now(),
            document: Arc::new(doc.source().clone()),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// How a document left the pipeline when no fatal failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Dropped,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Succeeded => "succeeded",
            ExecutionOutcome::Dropped => "dropped",
        }
    }
}

/// Per-node state for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Skipped,
    Succeeded,
    FailedRecovered,
    FailedFatal,
    Dropped,
}

#[derive(Debug, Clone)]
pub struct NodeReport {
    pub processor: String,
    /// 0 for top-level nodes, +1 per on-failure chain
    pub depth: usize,
    pub state: NodeState,
    pub duration: Duration,
}

/// Outcome plus the state of every node visited, in execution order
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution_id: u64,
    pub outcome: ExecutionOutcome,
    pub nodes: Vec<NodeReport>,
    pub duration: Duration,
}

impl ExecutionReport {
    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state == state).count()
    }
}
