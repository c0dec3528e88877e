// src/lib.rs
pub mod conditions;
pub mod document;
pub mod error;
pub mod grok;
pub mod input_format;
pub mod metrics;
pub mod pipeline;
pub mod processors;
pub mod template;
pub mod watchdog;

pub use error::*;

pub use conditions::{Condition, ConditionParser, ConditionRegistry, CustomCondition};
pub use document::{Document, FieldKind};
pub use grok::{Grok, GrokCompiler};
pub use input_format::{InputFormat, LineParser};
pub use metrics::{InMemoryMetricsTracker, MetricsSnapshot, MetricsTracker, ProcessorStats};
pub use pipeline::config::{PipelineDefinition, ProcessorDefinition, WatchdogConfig};
pub use pipeline::context::{
    ExecutionContext, ExecutionOutcome, ExecutionReport, NodeReport, NodeState, ProcessResult,
};
pub use pipeline::executor::PipelineExecutor;
pub use pipeline::factory::PipelineFactory;
pub use pipeline::processor::{Processor, ProcessorFactory, ProcessorRegistry};
pub use pipeline::{Pipeline, ProcessorNode};
pub use template::Template;
pub use watchdog::{ExecutionWatchdog, TrackedExecution};
