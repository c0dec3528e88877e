// src/error.rs

/// Raised while building pipelines, conditions or grok patterns.
/// Never produced during steady-state document processing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unknown processor type '{0}'")]
    UnknownProcessor(String),

    #[error("Unknown condition type '{0}'")]
    UnknownCondition(String),

    #[error("Invalid configuration for '{component}': {message}")]
    InvalidConfig { component: String, message: String },

    #[error("Unknown grok pattern '{0}'")]
    UnknownPattern(String),

    #[error("Invalid grok pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to compile regex for '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Grok pattern '{0}' did not resolve after too many expansions (recursive definition?)")]
    RecursivePattern(String),

    #[error("Pipeline '{0}' has no processors")]
    EmptyPipeline(String),

    #[error("Document source must not be empty")]
    EmptyDocument,

    #[error("On-failure processors nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    #[error("Failed to parse definition: {0}")]
    Parse(String),
}

impl ConfigurationError {
    pub fn invalid(component: &str, message: impl Into<String>) -> Self {
        ConfigurationError::InvalidConfig {
            component: component.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigurationError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

/// Path resolution failures raised by `Document` operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldAccessError {
    #[error("Field '{path}' not found")]
    NotFound { path: String },

    #[error("Field '{path}' is not traversable at segment '{segment}'")]
    NotTraversable { path: String, segment: String },

    #[error("Field '{path}' is not a list")]
    NotAList { path: String },
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a processor's `process` call, tagged with the processor name.
#[derive(Debug, thiserror::Error)]
#[error("Processor '{processor}' failed: {message}")]
pub struct ProcessorExecutionError {
    pub processor: String,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl ProcessorExecutionError {
    pub fn new(processor: &str, message: impl Into<String>) -> Self {
        ProcessorExecutionError {
            processor: processor.to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(processor: &str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        ProcessorExecutionError {
            processor: processor.to_string(),
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Top-level error returned by the executor when a document fails fatally.
#[derive(Debug, thiserror::Error)]
#[error("Pipeline '{pipeline_id}' failed in processor '{processor}'")]
pub struct PipelineExecutionError {
    pub pipeline_id: String,
    pub processor: String,
    #[source]
    pub source: ProcessorExecutionError,
}
