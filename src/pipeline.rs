// src/pipeline.rs
use crate::conditions::Condition;
use crate::error::ConfigurationError;
use crate::pipeline::processor::Processor;
use std::fmt;

pub mod config;
pub mod context;
pub mod executor;
pub mod factory;
pub mod processor;

/// A processor plus its gate and failure policy
pub struct ProcessorNode {
    processor: Box<dyn Processor>,
    condition: Option<Condition>,
    on_failure: Vec<ProcessorNode>,
    ignore_failure: bool,
}

impl ProcessorNode {
    pub fn new(processor: Box<dyn Processor>) -> Self {
        ProcessorNode {
            processor,
            condition: None,
            on_failure: Vec::new(),
            ignore_failure: false,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_on_failure(mut self, nodes: Vec<ProcessorNode>) -> Self {
        self.on_failure = nodes;
        self
    }

    pub fn ignore_failure(mut self, ignore: bool) -> Self {
        self.ignore_failure = ignore;
        self
    }

    pub fn name(&self) -> &str {
        self.processor.name()
    }

    pub fn processor(&self) -> &dyn Processor {
        self.processor.as_ref()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn on_failure(&self) -> &[ProcessorNode] {
        &self.on_failure
    }

    pub fn ignores_failure(&self) -> bool {
        self.ignore_failure
    }
}

impl fmt::Debug for ProcessorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorNode")
            .field("processor", &self.processor.name())
            .field("condition", &self.condition)
            .field("on_failure", &self.on_failure)
            .field("ignore_failure", &self.ignore_failure)
            .finish()
    }
}

/// An ordered, immutable chain of processor nodes.
/// Reconfiguring means building a new `Pipeline`.
#[derive(Debug)]
pub struct Pipeline {
    id: String,
    name: String,
    description: String,
    processors: Vec<ProcessorNode>,
}

impl Pipeline {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        processors: Vec<ProcessorNode>,
    ) -> Result<Self, ConfigurationError> {
        if processors.is_empty() {
            return Err(ConfigurationError::EmptyPipeline(id.to_string()));
        }
        Ok(Pipeline {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            processors,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn processors(&self) -> &[ProcessorNode] {
        &self.processors
    }
}
