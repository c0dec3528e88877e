// src/processors/drop.rs
use super::parse_config;
use crate::document::Document;
use crate::error::ConfigurationError;
use crate::pipeline::context::ProcessResult;
use crate::pipeline::processor::Processor;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Drops the document, or a random `percentage` of documents
pub struct DropProcessor {
    percentage: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DropConfig {
    #[serde(default = "default_percentage")]
    percentage: f64,
}

fn default_percentage() -> f64 {
    100.0
}

impl DropProcessor {
    pub const NAME: &'static str = "drop";

    pub fn new(percentage: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=100.0).contains(&percentage) {
            return Err(ConfigurationError::invalid(
                Self::NAME,
                format!("percentage must be within 0..=100, got {}", percentage),
            ));
        }
        Ok(DropProcessor { percentage })
    }

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: DropConfig = parse_config(Self::NAME, config)?;
        Self::new(config.percentage)
    }
}

impl Processor for DropProcessor {
    fn process(&self, _doc: &mut Document) -> ProcessResult {
        if self.percentage >= 100.0 {
            return ProcessResult::Drop;
        }
        if self.percentage > 0.0 && rand::thread_rng().gen_range(0.0..100.0) < self.percentage {
            return ProcessResult::Drop;
        }
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
