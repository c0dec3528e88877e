// src/pipeline/processor.rs
use crate::document::Document;
use crate::error::ConfigurationError;
use crate::grok::GrokCompiler;
use crate::pipeline::context::ProcessResult;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A named unit of mutation applied to a document.
///
/// A single instance is shared by every thread executing its pipeline, so
/// `process` takes `&self` and must not keep per-document state.
pub trait Processor: Send + Sync {
    fn process(&self, doc: &mut Document) -> ProcessResult;
    fn name(&self) -> &str;
}

/// Builds a processor instance from its configuration map
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, config: &Map<String, Value>) -> Result<Box<dyn Processor>, ConfigurationError>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&Map<String, Value>) -> Result<Box<dyn Processor>, ConfigurationError> + Send + Sync,
{
    fn create(&self, config: &Map<String, Value>) -> Result<Box<dyn Processor>, ConfigurationError> {
        self(config)
    }
}

/// Processor type name -> factory. Built once at startup and passed down.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, Arc<dyn ProcessorFactory>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor. The grok processor compiles
    /// its expressions against `grok`.
    pub fn with_builtins(grok: GrokCompiler) -> Self {
        let mut registry = Self::new();
        crate::processors::register_builtins(&mut registry, Arc::new(Mutex::new(grok)));
        registry
    }

    pub fn register(&mut self, name: &str, factory: impl ProcessorFactory + 'static) {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProcessorFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
