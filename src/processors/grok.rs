// src/processors/grok.rs
use super::parse_config;
use crate::conditions::registry::OneOrMany;
use crate::document::{json_type_name, Document};
use crate::error::ConfigurationError;
use crate::grok::{Grok, GrokCompiler};
use crate::pipeline::context::ProcessResult;
use crate::pipeline::processor::Processor;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Extracts fields from a string with the first matching grok expression.
///
/// A captured field that already exists in the document is turned into a
/// list holding both values unless it is named in `overwrite`.
pub struct GrokProcessor {
    field: String,
    groks: Vec<Grok>,
    overwrite: Vec<String>,
    ignore_missing: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GrokConfig {
    field: String,
    patterns: OneOrMany,
    #[serde(default)]
    overwrite: Vec<String>,
    #[serde(default)]
    ignore_missing: bool,
}

impl GrokProcessor {
    pub const NAME: &'static str = "grok";

    pub fn from_config(
        config: &Map<String, Value>,
        compiler: &Mutex<GrokCompiler>,
    ) -> Result<Self, ConfigurationError> {
        let config: GrokConfig = parse_config(Self::NAME, config)?;
        let patterns = config.patterns.into_vec();
        if patterns.is_empty() {
            return Err(ConfigurationError::invalid(Self::NAME, "'patterns' must not be empty"));
        }

        let mut compiler = compiler.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let groks = patterns
            .iter()
            .map(|expression| compiler.compile(expression, true))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GrokProcessor {
            field: config.field,
            groks,
            overwrite: config.overwrite,
            ignore_missing: config.ignore_missing,
        })
    }

    fn merge(&self, doc: &mut Document, key: &str, value: Value) -> Result<(), String> {
        if self.overwrite.iter().any(|o| o == key) {
            return doc.add_field(key, value).map_err(|e| e.to_string());
        }
        let merged = match doc.get_field(key) {
            None => value,
            Some(Value::Array(existing)) => {
                let mut list = existing.clone();
                match value {
                    Value::Array(values) => list.extend(values),
                    single => list.push(single),
                }
                Value::Array(list)
            }
            Some(existing) => {
                let mut list = vec![existing.clone()];
                match value {
                    Value::Array(values) => list.extend(values),
                    single => list.push(single),
                }
                Value::Array(list)
            }
        };
        doc.add_field(key, merged).map_err(|e| e.to_string())
    }
}

impl Processor for GrokProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let captures = match doc.get_field(&self.field) {
            Some(Value::String(text)) => self.groks.iter().find_map(|grok| grok.captures(text)),
            Some(other) => {
                return ProcessResult::error(
                    Self::NAME,
                    format!("field '{}' is a {}, not a string", self.field, json_type_name(other)),
                )
            }
            None if self.ignore_missing => return ProcessResult::Ok,
            None => {
                return ProcessResult::error(Self::NAME, format!("field '{}' not found", self.field))
            }
        };

        let Some(captures) = captures else {
            return ProcessResult::error(
                Self::NAME,
                format!("no grok expression matched field '{}'", self.field),
            );
        };

        // Every target must be writable before any capture is merged
        for key in captures.keys() {
            if let Err(e) = doc.check_writable(key) {
                return ProcessResult::error(Self::NAME, e.to_string());
            }
        }
        for (key, value) in captures {
            if let Err(message) = self.merge(doc, &key, value) {
                return ProcessResult::error(Self::NAME, message);
            }
        }
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiler() -> Mutex<GrokCompiler> {
        Mutex::new(GrokCompiler::with_default_patterns())
    }

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_matching_expression_wins() {
        let p = GrokProcessor::from_config(
            &config(json!({
                "field": "message",
                "patterns": ["%{INT:code:long} only", "%{WORD:verb} %{INT:code:long}"]
            })),
            &compiler(),
        )
        .unwrap();
        let mut doc = Document::from_value(json!({"message": "GET 200"})).unwrap();
        assert!(p.process(&mut doc).is_ok());
        assert_eq!(doc.get_field("verb"), Some(&json!("GET")));
        assert_eq!(doc.get_field("code"), Some(&json!(200)));
    }

    #[test]
    fn test_existing_field_becomes_list_unless_overwritten() {
        let c = compiler();
        let merge = GrokProcessor::from_config(
            &config(json!({"field": "message", "patterns": "%{WORD:user}"})),
            &c,
        )
        .unwrap();
        let overwrite = GrokProcessor::from_config(
            &config(json!({"field": "message", "patterns": "%{WORD:user}", "overwrite": ["user"]})),
            &c,
        )
        .unwrap();

        let mut doc = Document::from_value(json!({"message": "bob", "user": "ann"})).unwrap();
        assert!(merge.process(&mut doc).is_ok());
        assert_eq!(doc.get_field("user"), Some(&json!(["ann", "bob"])));

        let mut doc = Document::from_value(json!({"message": "bob", "user": "ann"})).unwrap();
        assert!(overwrite.process(&mut doc).is_ok());
        assert_eq!(doc.get_field("user"), Some(&json!("bob")));
    }

    #[test]
    fn test_missing_field_and_no_match() {
        let c = compiler();
        let strict = GrokProcessor::from_config(&config(json!({"field": "msg", "patterns": ["%{INT:n}"]})), &c).unwrap();
        let lenient = GrokProcessor::from_config(
            &config(json!({"field": "msg", "patterns": ["%{INT:n}"], "ignoreMissing": true})),
            &c,
        )
        .unwrap();

        let mut doc = Document::from_value(json!({"other": 1})).unwrap();
        assert!(matches!(strict.process(&mut doc), ProcessResult::Error(_)));
        assert!(lenient.process(&mut doc).is_ok());

        let mut doc = Document::from_value(json!({"msg": "no digits"})).unwrap();
        assert!(matches!(strict.process(&mut doc), ProcessResult::Error(_)));
    }

    #[test]
    fn test_unwritable_target_leaves_document_untouched() {
        let p = GrokProcessor::from_config(
            &config(json!({"field": "message", "patterns": ["%{WORD:verb} %{URIPATH:http.path}"]})),
            &compiler(),
        )
        .unwrap();
        let mut doc = Document::from_value(json!({"message": "GET /x", "http": "scalar"})).unwrap();
        let before = doc.clone();
        assert!(matches!(p.process(&mut doc), ProcessResult::Error(_)));
        assert_eq!(doc, before);
        assert!(!doc.has_field("verb"));
    }

    #[test]
    fn test_unknown_pattern_is_configuration_error() {
        let err = GrokProcessor::from_config(
            &config(json!({"field": "m", "patterns": ["%{NOPE:x}"]})),
            &compiler(),
        );
        assert!(matches!(err, Err(ConfigurationError::UnknownPattern(_))));
    }
}
