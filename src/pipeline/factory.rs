// src/pipeline/factory.rs
use crate::conditions::ConditionParser;
use crate::error::ConfigurationError;
use crate::pipeline::config::{PipelineDefinition, ProcessorDefinition};
use crate::pipeline::processor::ProcessorRegistry;
use crate::pipeline::{Pipeline, ProcessorNode};
use std::sync::Arc;

/// Deepest allowed nesting of on-failure chains
pub const MAX_NESTING_DEPTH: usize = 32;

/// Builds immutable pipelines from definitions and registries
#[derive(Clone)]
pub struct PipelineFactory {
    processors: Arc<ProcessorRegistry>,
    conditions: ConditionParser,
}

impl PipelineFactory {
    pub fn new(processors: Arc<ProcessorRegistry>, conditions: ConditionParser) -> Self {
        PipelineFactory {
            processors,
            conditions,
        }
    }

    pub fn build(&self, definition: &PipelineDefinition) -> Result<Pipeline, ConfigurationError> {
        let nodes = self.build_nodes(&definition.processors, 0)?;
        let pipeline = Pipeline::new(&definition.id, &definition.name, &definition.description, nodes)?;
        tracing::info!(
            "Built pipeline '{}' ({}) with {} processors",
            pipeline.id(),
            pipeline.name(),
            pipeline.processors().len()
        );
        Ok(pipeline)
    }

    pub fn build_from_json(&self, text: &str) -> Result<Pipeline, ConfigurationError> {
        self.build(&PipelineDefinition::from_json(text)?)
    }

    pub fn build_from_yaml(&self, text: &str) -> Result<Pipeline, ConfigurationError> {
        self.build(&PipelineDefinition::from_yaml(text)?)
    }

    fn build_nodes(
        &self,
        definitions: &[ProcessorDefinition],
        depth: usize,
    ) -> Result<Vec<ProcessorNode>, ConfigurationError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ConfigurationError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        definitions
            .iter()
            .map(|definition| self.build_node(definition, depth))
            .collect()
    }

    fn build_node(
        &self,
        definition: &ProcessorDefinition,
        depth: usize,
    ) -> Result<ProcessorNode, ConfigurationError> {
        let factory = self
            .processors
            .get(&definition.name)
            .ok_or_else(|| ConfigurationError::UnknownProcessor(definition.name.clone()))?;

        let processor = factory.create(&definition.config)?;
        let mut node = ProcessorNode::new(processor).ignore_failure(definition.ignore_failure);

        if let Some(condition) = &definition.condition {
            node = node.with_condition(self.conditions.parse(condition)?);
        }
        if !definition.on_failure_processors.is_empty() {
            node = node.with_on_failure(self.build_nodes(&definition.on_failure_processors, depth + 1)?);
        }

        Ok(node)
    }
}
