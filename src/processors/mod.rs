// src/processors/mod.rs
use crate::error::ConfigurationError;
use crate::grok::GrokCompiler;
use crate::pipeline::processor::{Processor, ProcessorRegistry};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

pub mod drop;
pub mod fields;
pub mod grok;
pub mod parse;
pub mod text;

pub use self::drop::DropProcessor;
pub use self::fields::{
    AddFieldProcessor, AddTagProcessor, AppendListProcessor, RemoveFieldProcessor,
    RemoveTagProcessor, RenameProcessor,
};
pub use self::grok::GrokProcessor;
pub use self::parse::{DateProcessor, JsonProcessor, KvProcessor};
pub use self::text::{CaseProcessor, ConvertProcessor, GsubProcessor, SplitProcessor, TrimProcessor};

/// Register every built-in processor type under its configuration name
pub fn register_builtins(registry: &mut ProcessorRegistry, grok: Arc<Mutex<GrokCompiler>>) {
    registry.register("addField", boxed(AddFieldProcessor::from_config));
    registry.register("removeField", boxed(RemoveFieldProcessor::from_config));
    registry.register("rename", boxed(RenameProcessor::from_config));
    registry.register("addTag", boxed(AddTagProcessor::from_config));
    registry.register("removeTag", boxed(RemoveTagProcessor::from_config));
    registry.register("appendList", boxed(AppendListProcessor::from_config));
    registry.register("lowercase", boxed(CaseProcessor::lowercase_from_config));
    registry.register("uppercase", boxed(CaseProcessor::uppercase_from_config));
    registry.register("trim", boxed(TrimProcessor::from_config));
    registry.register("gsub", boxed(GsubProcessor::from_config));
    registry.register("split", boxed(SplitProcessor::from_config));
    registry.register("convert", boxed(ConvertProcessor::from_config));
    registry.register("json", boxed(JsonProcessor::from_config));
    registry.register("kv", boxed(KvProcessor::from_config));
    registry.register("date", boxed(DateProcessor::from_config));
    registry.register("drop", boxed(DropProcessor::from_config));
    registry.register(
        "grok",
        move |config: &Map<String, Value>| -> Result<Box<dyn Processor>, ConfigurationError> {
            Ok(Box::new(GrokProcessor::from_config(config, &grok)?))
        },
    );
}

/// Adapt a typed constructor into a registry factory
fn boxed<P, F>(
    build: F,
) -> impl Fn(&Map<String, Value>) -> Result<Box<dyn Processor>, ConfigurationError> + Send + Sync
where
    P: Processor + 'static,
    F: Fn(&Map<String, Value>) -> Result<P, ConfigurationError> + Send + Sync,
{
    move |config| Ok(Box::new(build(config)?) as Box<dyn Processor>)
}

/// Deserialize a processor's configuration map into its typed config
pub(crate) fn parse_config<T: DeserializeOwned>(
    processor: &str,
    config: &Map<String, Value>,
) -> Result<T, ConfigurationError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| ConfigurationError::invalid(processor, e.to_string()))
}
