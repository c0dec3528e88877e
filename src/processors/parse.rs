// src/processors/parse.rs - processors that parse one string field into structure
use super::parse_config;
use crate::document::{json_type_name, Document};
use crate::error::ConfigurationError;
use crate::pipeline::context::ProcessResult;
use crate::pipeline::processor::Processor;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

fn string_field<'d>(processor: &str, doc: &'d Document, field: &str) -> Result<&'d str, ProcessResult> {
    match doc.get_field(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ProcessResult::error(
            processor,
            format!("field '{}' is a {}, not a string", field, json_type_name(other)),
        )),
        None => Err(ProcessResult::error(processor, format!("field '{}' not found", field))),
    }
}

/// Write every entry under `target`, or at the document root when unset
fn merge_into(processor: &str, doc: &mut Document, target: Option<&str>, entries: Map<String, Value>) -> ProcessResult {
    for (key, value) in entries {
        let path = match target {
            Some(target) => format!("{}.{}", target, key),
            None => key,
        };
        if let Err(e) = doc.add_field(&path, value) {
            return ProcessResult::error(processor, e.to_string());
        }
    }
    ProcessResult::Ok
}

/// Parses a JSON string field
pub struct JsonProcessor {
    field: String,
    target_field: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JsonConfig {
    field: String,
    #[serde(default)]
    target_field: Option<String>,
}

impl JsonProcessor {
    pub const NAME: &'static str = "json";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: JsonConfig = parse_config(Self::NAME, config)?;
        Ok(JsonProcessor {
            field: config.field,
            target_field: config.target_field,
        })
    }
}

impl Processor for JsonProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let parsed: Value = match string_field(Self::NAME, doc, &self.field) {
            Ok(text) => match serde_json::from_str(text) {
                Ok(v) => v,
                Err(e) => {
                    return ProcessResult::Error(crate::error::ProcessorExecutionError::with_source(
                        Self::NAME, e,
                    ))
                }
            },
            Err(result) => return result,
        };

        match (parsed, self.target_field.as_deref()) {
            (parsed, Some(target)) => match doc.add_field(target, parsed) {
                Ok(()) => ProcessResult::Ok,
                Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
            },
            (Value::Object(entries), None) => merge_into(Self::NAME, doc, None, entries),
            (other, None) => ProcessResult::error(
                Self::NAME,
                format!(
                    "parsed {} from '{}' needs a targetField",
                    json_type_name(&other),
                    self.field
                ),
            ),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Splits `key=value` pairs out of a string field
pub struct KvProcessor {
    field: String,
    field_split: String,
    value_split: String,
    target_field: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct KvConfig {
    field: String,
    #[serde(default = "default_field_split")]
    field_split: String,
    #[serde(default = "default_value_split")]
    value_split: String,
    #[serde(default)]
    target_field: Option<String>,
}

fn default_field_split() -> String {
    " ".to_string()
}

fn default_value_split() -> String {
    "=".to_string()
}

impl KvProcessor {
    pub const NAME: &'static str = "kv";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: KvConfig = parse_config(Self::NAME, config)?;
        if config.field_split.is_empty() || config.value_split.is_empty() {
            return Err(ConfigurationError::invalid(
                Self::NAME,
                "'fieldSplit' and 'valueSplit' must not be empty",
            ));
        }
        Ok(KvProcessor {
            field: config.field,
            field_split: config.field_split,
            value_split: config.value_split,
            target_field: config.target_field,
        })
    }

    fn parse(&self, text: &str) -> Map<String, Value> {
        let mut entries = Map::new();
        for pair in text.split(self.field_split.as_str()) {
            let Some((key, value)) = pair.split_once(self.value_split.as_str()) else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_string(), Value::String(unquote(value.trim()).to_string()));
        }
        entries
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl Processor for KvProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let entries = match string_field(Self::NAME, doc, &self.field) {
            Ok(text) => self.parse(text),
            Err(result) => return result,
        };
        merge_into(Self::NAME, doc, self.target_field.as_deref(), entries)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// One entry of the `date` processor's `formats` list
#[derive(Debug, Clone, PartialEq, Eq)]
enum DateFormat {
    Iso8601,
    Unix,
    UnixMs,
    Pattern(String),
}

impl DateFormat {
    fn parse(name: &str) -> Self {
        match name {
            "ISO8601" => DateFormat::Iso8601,
            "UNIX" => DateFormat::Unix,
            "UNIX_MS" => DateFormat::UnixMs,
            other => DateFormat::Pattern(other.to_string()),
        }
    }

    fn apply(&self, value: &Value) -> Option<DateTime<Utc>> {
        match (self, value) {
            (DateFormat::Unix, Value::Number(n)) => from_epoch_millis(n.as_f64()? * 1000.0),
            (DateFormat::Unix, Value::String(s)) => from_epoch_millis(s.trim().parse::<f64>().ok()? * 1000.0),
            (DateFormat::UnixMs, Value::Number(n)) => from_epoch_millis(n.as_f64()?),
            (DateFormat::UnixMs, Value::String(s)) => from_epoch_millis(s.trim().parse::<f64>().ok()?),
            (DateFormat::Iso8601, Value::String(s)) => parse_iso8601(s.trim()),
            (DateFormat::Pattern(format), Value::String(s)) => parse_with_format(s.trim(), format),
            _ => None,
        }
    }
}

fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats without an offset are read as UTC
fn parse_with_format(text: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses a timestamp field with the first matching format and writes it
/// as RFC 3339 UTC with millisecond precision
pub struct DateProcessor {
    field: String,
    target_field: String,
    formats: Vec<DateFormat>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DateConfig {
    field: String,
    #[serde(default = "default_date_target")]
    target_field: String,
    formats: Vec<String>,
}

fn default_date_target() -> String {
    "@timestamp".to_string()
}

impl DateProcessor {
    pub const NAME: &'static str = "date";

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let config: DateConfig = parse_config(Self::NAME, config)?;
        if config.formats.is_empty() {
            return Err(ConfigurationError::invalid(Self::NAME, "'formats' must not be empty"));
        }
        Ok(DateProcessor {
            field: config.field,
            target_field: config.target_field,
            formats: config.formats.iter().map(|f| DateFormat::parse(f)).collect(),
        })
    }
}

impl Processor for DateProcessor {
    fn process(&self, doc: &mut Document) -> ProcessResult {
        let value = match doc.try_get_field(&self.field) {
            Ok(value) => value,
            Err(e) => return ProcessResult::error(Self::NAME, e.to_string()),
        };
        let Some(parsed) = self.formats.iter().find_map(|format| format.apply(value)) else {
            return ProcessResult::error(
                Self::NAME,
                format!("no format matched value of '{}'", self.field),
            );
        };
        let rendered = parsed.to_rfc3339_opts(SecondsFormat::Millis, true);
        match doc.add_field(&self.target_field, Value::String(rendered)) {
            Ok(()) => ProcessResult::Ok,
            Err(e) => ProcessResult::error(Self::NAME, e.to_string()),
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
