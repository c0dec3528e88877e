// src/pipeline/config.rs
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

fn default_pipeline_id() -> String {
    "default".to_string()
}

/// Serialized form of a pipeline, as loaded from JSON or YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    #[serde(default = "default_pipeline_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub processors: Vec<ProcessorDefinition>,
}

/// One processor entry. `name` selects the processor type from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorDefinition {
    #[serde(alias = "type")]
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_failure_processors: Vec<ProcessorDefinition>,
    #[serde(default)]
    pub ignore_failure: bool,
}

impl PipelineDefinition {
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load by file extension: `.json` is JSON, anything else is read as YAML
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::Parse(format!("failed to read '{}': {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

/// Time-bucket layout of the execution watchdog.
/// An execution is reported once it has been in flight for `slice * buckets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub slice: Duration,
    pub buckets: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            slice: Duration::from_millis(100),
            buckets: 10,
        }
    }
}

impl WatchdogConfig {
    pub fn new(slice: Duration, buckets: usize) -> Result<Self, ConfigurationError> {
        let config = WatchdogConfig { slice, buckets };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.slice.is_zero() {
            return Err(ConfigurationError::invalid("watchdog", "slice must be greater than zero"));
        }
        if self.buckets == 0 {
            return Err(ConfigurationError::invalid("watchdog", "at least one bucket is required"));
        }
        if self.checked_threshold().is_none() {
            return Err(ConfigurationError::invalid(
                "watchdog",
                format!("{:?} x {} buckets overflows the threshold", self.slice, self.buckets),
            ));
        }
        Ok(())
    }

    fn checked_threshold(&self) -> Option<Duration> {
        let buckets = u32::try_from(self.buckets).ok()?;
        self.slice.checked_mul(buckets)
    }

    /// `slice * buckets`, saturating for configs that skipped `validate`
    pub fn threshold(&self) -> Duration {
        self.checked_threshold().unwrap_or(Duration::MAX)
    }
}
