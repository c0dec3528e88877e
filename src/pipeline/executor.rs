// src/pipeline/executor.rs
use crate::document::Document;
use crate::error::{PipelineExecutionError, ProcessorExecutionError};
use crate::metrics::MetricsTracker;
use crate::pipeline::context::{
    ExecutionContext, ExecutionOutcome, ExecutionReport, NodeReport, NodeState, ProcessResult,
};
use crate::pipeline::{Pipeline, ProcessorNode};
use crate::watchdog::ExecutionWatchdog;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metadata keys written by the executor
pub const INGEST_TIMESTAMP_KEY: &str = "ingestTimestamp";
pub const STATUS_KEY: &str = "status";

enum ChainResult {
    Completed,
    Dropped,
    Fatal(ProcessorExecutionError),
}

/// Drives documents through pipelines, one document per call.
///
/// Safe to share between threads; every call is independent and runs its
/// processor nodes sequentially on the calling thread.
pub struct PipelineExecutor {
    metrics: Arc<dyn MetricsTracker>,
    watchdog: Option<Arc<ExecutionWatchdog>>,
}

impl PipelineExecutor {
    pub fn new(metrics: Arc<dyn MetricsTracker>) -> Self {
        PipelineExecutor {
            metrics,
            watchdog: None,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Arc<ExecutionWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsTracker> {
        &self.metrics
    }

    pub fn execute(
        &self,
        pipeline: &Pipeline,
        doc: &mut Document,
    ) -> Result<ExecutionOutcome, PipelineExecutionError> {
        self.execute_with_report(pipeline, doc).map(|report| report.outcome)
    }

    /// Like `execute`, also returning the state of each node visited
    pub fn execute_with_report(
        &self,
        pipeline: &Pipeline,
        doc: &mut Document,
    ) -> Result<ExecutionReport, PipelineExecutionError> {
        let context = Arc::new(ExecutionContext::new(pipeline.id(), doc));
        let execution_id = context.execution_id;
        if !doc.metadata().contains_key(INGEST_TIMESTAMP_KEY) {
            doc.metadata_mut().insert(
                INGEST_TIMESTAMP_KEY.to_string(),
                Value::String(context.ingest_timestamp.to_rfc3339()),
            );
        }

        let tracked = self
            .watchdog
            .as_ref()
            .map(|watchdog| watchdog.track(Arc::clone(&context)));

        let started = Instant::now();
        let mut nodes = Vec::with_capacity(pipeline.processors().len());
        let result = self.run_chain(pipeline.id(), pipeline.processors(), doc, &mut nodes, 0);
        let duration = started.elapsed();

        drop(tracked);

        let outcome = match result {
            ChainResult::Completed => ExecutionOutcome::Succeeded,
            ChainResult::Dropped => ExecutionOutcome::Dropped,
            ChainResult::Fatal(source) => {
                set_status(doc, "failed");
                self.metrics.record_failed(pipeline.id(), &source.processor, doc);
                tracing::error!(
                    "Execution {} of pipeline '{}' failed in '{}': {}",
                    execution_id,
                    pipeline.id(),
                    source.processor,
                    source.message
                );
                return Err(PipelineExecutionError {
                    pipeline_id: pipeline.id().to_string(),
                    processor: source.processor.clone(),
                    source,
                });
            }
        };

        set_status(doc, outcome.as_str());
        match outcome {
            ExecutionOutcome::Succeeded => {
                self.metrics
                    .record_succeeded(pipeline.id(), doc, duration_ns(duration))
            }
            ExecutionOutcome::Dropped => self.metrics.record_dropped(pipeline.id(), doc),
        }

        tracing::trace!(
            "Execution {} of pipeline '{}' {} in {:?}",
            execution_id,
            pipeline.id(),
            outcome.as_str(),
            duration
        );

        Ok(ExecutionReport {
            execution_id,
            outcome,
            nodes,
            duration,
        })
    }

    /// Run nodes in order, routing failures through each node's on-failure
    /// chain and `ignore_failure` flag
    fn run_chain(
        &self,
        pipeline_id: &str,
        chain: &[ProcessorNode],
        doc: &mut Document,
        reports: &mut Vec<NodeReport>,
        depth: usize,
    ) -> ChainResult {
        for node in chain {
            if let Some(condition) = node.condition() {
                if !condition.evaluate(doc) {
                    tracing::trace!("Skipping '{}': condition not met", node.name());
                    reports.push(report(node, depth, NodeState::Skipped, Duration::ZERO));
                    continue;
                }
            }

            let started = Instant::now();
            let result = node.processor().process(doc);
            let elapsed = started.elapsed();
            self.metrics
                .record_processor_duration(node.name(), duration_ns(elapsed));

            let error = match result {
                ProcessResult::Ok => {
                    reports.push(report(node, depth, NodeState::Succeeded, elapsed));
                    continue;
                }
                ProcessResult::Drop => {
                    reports.push(report(node, depth, NodeState::Dropped, elapsed));
                    tracing::debug!("Document dropped by '{}' in pipeline '{}'", node.name(), pipeline_id);
                    return ChainResult::Dropped;
                }
                ProcessResult::Error(error) => error,
            };

            if !node.on_failure().is_empty() {
                match self.run_chain(pipeline_id, node.on_failure(), doc, reports, depth + 1) {
                    ChainResult::Completed => {}
                    ChainResult::Dropped => return ChainResult::Dropped,
                    // Failures inside an on-failure chain are reported only
                    ChainResult::Fatal(inner) => tracing::warn!(
                        "On-failure chain of '{}' in pipeline '{}' failed: {}",
                        node.name(),
                        pipeline_id,
                        inner
                    ),
                }
            }

            if node.ignores_failure() {
                tracing::warn!(
                    "Ignoring failure of '{}' in pipeline '{}': {}",
                    node.name(),
                    pipeline_id,
                    error
                );
                reports.push(report(node, depth, NodeState::FailedRecovered, elapsed));
                continue;
            }

            reports.push(report(node, depth, NodeState::FailedFatal, elapsed));
            return ChainResult::Fatal(error);
        }
        ChainResult::Completed
    }
}

fn report(node: &ProcessorNode, depth: usize, state: NodeState, duration: Duration) -> NodeReport {
    NodeReport {
        processor: node.name().to_string(),
        depth,
        state,
        duration,
    }
}

fn set_status(doc: &mut Document, status: &str) {
    doc.metadata_mut()
        .insert(STATUS_KEY.to_string(), Value::String(status.to_string()));
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
