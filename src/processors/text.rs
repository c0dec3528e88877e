// src/processors/text.rs - string and type conversion processors
use super::fields::non_empty;
use super::parse_config;
use crate::conditions::registry::OneOrMany;
use crate::document::{json_type_name, value_to_string, Document};
use crate::error::ConfigurationError;
use crate::pipeline::context::ProcessResult;
use crate::pipeline::processor::Processor;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldsConfig {
    fields: OneOrMany,
}

/// Rewrite the string at `field` in place. Missing fields are skipped,
/// non-string values are an error.
fn map_string(
    processor: &str,
    doc: &mut Document,
    field: &str,
    f: impl Fn(&str) -> String,
) -> Option<ProcessResult> {
    let mapped = match doc.get_field(field) {
        None => return None,
        Some(Value::String(s)) => f(s),
        Some(other) => {
            return Some(ProcessResult::error(
                processor,
                format!("field '{}' is a {}, not a string", field, json_type_name(other)),
            ))
        }
    };
    doc.add_field(field, Value::String(mapped))
        .err()
        .map(|e| ProcessResult::error(processor, e.to_string()))
}

/// `lowercase` / `uppercase`
pub struct CaseProcessor {
    fields: Vec<String>,
    upper: bool,
}

impl CaseProcessor {
    pub fn lowercase_from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        Self::from_config("lowercase", config, false)
    }

    pub fn uppercase_from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        Self::from_config("uppercase", config, true)
    }

    fn from_config(
        name: &str,
        config: &Map<String, Value>,
        upper: bool,
    ) -> Result<Self, ConfigurationError> {
        let config: FieldsConfig = parse_config(name, config)?;
        Ok(CaseProcessor {
            fields: non_empty(name, "fields", config.fields.into_vec())?,
            upper,
        })
    }
}

impl Processor for CaseProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        for field in &self.fields {
            let result = if self.upper {
                map_string(self.name(), doc, field, str::to_uppercase)
            } else {
                map_string(self.name(), doc, field, str::to_lowercase)
            };
            if let Some(err) = result {
                return err;
            }
        }
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        if self.upper {
            "uppercase"
        } else {
            "lowercase"
        }
    }
}

pub struct TrimProcessor {
    fields: Vec<String>,
}

impl TrimProcessor {
    pub const NAME: &'static str = "trim";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: FieldsConfig = parse_config(Self::NAME, config)?;
        Ok(TrimProcessor {
            fields: non_empty(Self::NAME, "fields", config.fields.into_vec())?,
        })
    }
}

impl Processor for TrimProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        for field in &self.fields {
            if let Some(err) = map_string(Self::NAME, doc, field, |s| s.trim().to_string()) {
                return err;
            }
        }
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Regex replace-all on a string field. `$1` / `${name}` refer to groups.
pub struct GsubProcessor {
    field: String,
    pattern: Regex,
    replacement: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GsubConfig {
    field: String,
    pattern: String,
    replacement: String,
}

impl GsubProcessor {
    pub const NAME: &'static str = "gsub";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: GsubConfig = parse_config(Self::NAME, config)?;
        let pattern = Regex::new(&config.pattern).map_err(|source| ConfigurationError::InvalidRegex {
            pattern: config.pattern.clone(),
            source,
        })?;
        Ok(GsubProcessor {
            field: config.field,
            pattern,
            replacement: config.replacement,
        })
    }
}

impl Processor for GsubProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        if !doc.has_field(&self.field) {
            return ProcessResult::error(Self::NAME, format!("field '{}' not found", self.field));
        }
        let replaced = map_string(Self::NAME, doc, &self.field, |s| {
            self.pattern
                .replace_all(s, self.replacement.as_str())
                .into_owned()
        });
        replaced.unwrap_or(ProcessResult::Ok)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Splits a string field into a list on a literal separator
pub struct SplitProcessor {
    field: String,
    separator: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SplitConfig {
    field: String,
    separator: String,
}

impl SplitProcessor {
    pub const NAME: &'static str = "split";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: SplitConfig = parse_config(Self::NAME, config)?;
        if config.separator.is_empty() {
            return Err(ConfigurationError::invalid(Self::NAME, "'separator' must not be empty"));
        }
        Ok(SplitProcessor {
            field: config.field,
            separator: config.separator,
        })
    }
}

impl Processor for SplitProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let parts: Vec<Value> = match doc.get_field(&self.field) {
            Some(Value::String(s)) => s
                .split(self.separator.as_str())
                .map(|part| Value::String(part.to_string()))
                .collect(),
            Some(other) => {
                return ProcessResult::error(
                    Self::NAME,
                    format!("field '{}' is a {}, not a string", self.field, json_type_name(other)),
                )
            }
            None => {
                return ProcessResult::error(Self::NAME, format!("field '{}' not found", self.field))
            }
        };
        match doc.add_field(&self.field, Value::Array(parts)) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Target type of `convert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertType {
    #[serde(alias = "int", alias = "integer")]
    Long,
    #[serde(alias = "float")]
    Double,
    String,
    #[serde(alias = "bool")]
    Boolean,
}

impl ConvertType {
    fn convert(self, value: &Value) -> Option<Value> {
        match self {
            ConvertType::String => Some(Value::String(value_to_string(value))),
            ConvertType::Long => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .map(Value::from),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                Value::Bool(b) => Some(Value::from(i64::from(*b))),
                _ => None,
            },
            ConvertType::Double => {
                let f = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }?;
                Number::from_f64(f).map(Value::Number)
            }
            ConvertType::Boolean => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Some(Value::Bool(true)),
                    "false" | "no" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::Number(n) => n.as_i64().map(|i| Value::Bool(i != 0)),
                _ => None,
            },
        }
    }
}

pub struct ConvertProcessor {
    path: String,
    to: ConvertType,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConvertConfig {
    path: String,
    #[serde(rename = "type")]
    to: ConvertType,
}

impl ConvertProcessor {
    pub const NAME: &'static str = "convert";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: ConvertConfig = parse_config(Self::NAME, config)?;
        Ok(ConvertProcessor {
            path: config.path,
            to: config.to,
        })
    }
}

impl Processor for ConvertProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let value = match doc.try_get_field(&self.path) {
            Ok(value) => value,
            Err(e) => return ProcessResult::error(Self::NAME, e.to_string()),
        };
        let Some(converted) = self.to.convert(value) else {
            return ProcessResult::error(
                Self::NAME,
                format!("cannot convert '{}' at '{}' to {:?}", value_to_string(value), self.path, self.to),
            );
        };
        match doc.add_field(&self.path, converted) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
