// src/processors/fields.rs - structural field processors
use super::parse_config;
use crate::conditions::registry::OneOrMany;
use crate::document::Document;
use crate::error::ConfigurationError;
use crate::pipeline::context::ProcessResult;
use crate::pipeline::processor::Processor;
use crate::template::Template;
use serde::Deserialize;
use serde_json::{Map, Value};

/// List field written by `addTag` / `removeTag`
pub const TAGS_FIELD: &str = "tags";

/// A configured value; strings are rendered as templates per document
#[derive(Debug, Clone)]
enum FieldValue {
    Template(Template),
    Literal(Value),
}

impl FieldValue {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Template(Template::new(&s)),
            other => FieldValue::Literal(other),
        }
    }

    fn render(&self, doc: &Document) -> Value {
        match self {
            FieldValue::Template(t) => Value::String(t.render(doc)),
            FieldValue::Literal(v) => v.clone(),
        }
    }
}

pub(crate) fn non_empty(
    processor: &str,
    key: &str,
    values: Vec<String>,
) -> Result<Vec<String>, ConfigurationError> {
    if values.is_empty() {
        return Err(ConfigurationError::invalid(
            processor,
            format!("'{}' must not be empty", key),
        ));
    }
    Ok(values)
}

pub struct AddFieldProcessor {
    path: Template,
    value: FieldValue,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddFieldConfig {
    path: String,
    value: Value,
}

impl AddFieldProcessor {
    pub const NAME: &'static str = "addField";

    pub fn new(path: &str, value: Value) -> Self {
        AddFieldProcessor {
            path: Template::new(path),
            value: FieldValue::from_value(value),
        }
    }

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: AddFieldConfig = parse_config(Self::NAME, config)?;
        Ok(Self::new(&config.path, config.value))
    }
}

impl Processor for AddFieldProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let path = self.path.render(doc);
        let value = self.value.render(doc);
        match doc.add_field(&path, value) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Removes each listed field; missing fields are ignored
pub struct RemoveFieldProcessor {
    fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveFieldConfig {
    fields: OneOrMany,
}

impl RemoveFieldProcessor {
    pub const NAME: &'static str = "removeField";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: RemoveFieldConfig = parse_config(Self::NAME, config)?;
        Ok(RemoveFieldProcessor {
            fields: non_empty(Self::NAME, "fields", config.fields.into_vec())?,
        })
    }
}

impl Processor for RemoveFieldProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        for field in &self.fields {
            if doc.has_field(field) {
                if let Err(e) = doc.remove_field(field) {
                    return ProcessResult::error(Self::NAME, e.to_string());
                }
            }
        }
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

pub struct RenameProcessor {
    from: String,
    to: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameConfig {
    from: String,
    to: String,
}

impl RenameProcessor {
    pub const NAME: &'static str = "rename";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: RenameConfig = parse_config(Self::NAME, config)?;
        if config.from == config.to {
            return Err(ConfigurationError::invalid(
                Self::NAME,
                "'from' and 'to' must differ",
            ));
        }
        Ok(RenameProcessor {
            from: config.from,
            to: config.to,
        })
    }
}

impl Processor for RenameProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        match doc.rename_field(&self.from, &self.to) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Adds tags to the `tags` list, skipping ones already present
pub struct AddTagProcessor {
    tags: Vec<Template>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TagConfig {
    tags: OneOrMany,
}

impl AddTagProcessor {
    pub const NAME: &'static str = "addTag";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: TagConfig = parse_config(Self::NAME, config)?;
        let tags = non_empty(Self::NAME, "tags", config.tags.into_vec())?;
        Ok(AddTagProcessor {
            tags: tags.iter().map(|t| Template::new(t)).collect(),
        })
    }
}

impl Processor for AddTagProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let existing = match doc.get_field(TAGS_FIELD) {
            Some(Value::Array(list)) => list.clone(),
            _ => Vec::new(),
        };
        let mut new_tags: Vec<Value> = Vec::new();
        for tag in &self.tags {
            let tag = Value::String(tag.render(doc));
            if !existing.contains(&tag) && !new_tags.contains(&tag) {
                new_tags.push(tag);
            }
        }
        match doc.append_to_list(TAGS_FIELD, new_tags) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

pub struct RemoveTagProcessor {
    tags: Vec<Template>,
}

impl RemoveTagProcessor {
    pub const NAME: &'static str = "removeTag";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: TagConfig = parse_config(Self::NAME, config)?;
        let tags = non_empty(Self::NAME, "tags", config.tags.into_vec())?;
        Ok(RemoveTagProcessor {
            tags: tags.iter().map(|t| Template::new(t)).collect(),
        })
    }
}

impl Processor for RemoveTagProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let tags: Vec<Value> = self
            .tags
            .iter()
            .map(|t| Value::String(t.render(doc)))
            .collect();
        match doc.remove_from_list(TAGS_FIELD, &tags) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

pub struct AppendListProcessor {
    path: String,
    values: Vec<FieldValue>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AppendListConfig {
    path: String,
    values: Vec<Value>,
}

impl AppendListProcessor {
    pub const NAME: &'static str = "appendList";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: AppendListConfig = parse_config(Self::NAME, config)?;
        if config.values.is_empty() {
            return Err(ConfigurationError::invalid(Self::NAME, "'values' must not be empty"));
        }
        Ok(AppendListProcessor {
            path: config.path,
            values: config.values.into_iter().map(FieldValue::from_value).collect(),
        })
    }
}

impl Processor for AppendListProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let values = self.values.iter().map(|v| v.render(doc)).collect();
        match doc.append_to_list(&self.path, values) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
