// src/input_format.rs - turn input lines into documents
use crate::document::Document;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    /// One JSON object per line
    #[default]
    #[value(name = "jsonl")]
    Jsonl,
    /// key=value pairs, values optionally double-quoted
    #[value(name = "logfmt")]
    Logfmt,
    /// Raw text, stored under `message`
    #[value(name = "plain")]
    Plain,
}

/// Field holding the raw line for `plain` input
pub const MESSAGE_FIELD: &str = "message";

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid logfmt: {0}")]
    Logfmt(String),

    #[error("line has no fields")]
    Empty,
}

pub trait LineParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Result<Document, InputError>;
}

impl InputFormat {
    pub fn parser(self) -> Box<dyn LineParser> {
        match self {
            InputFormat::Jsonl => Box::new(JsonlParser),
            InputFormat::Logfmt => Box::new(LogfmtParser),
            InputFormat::Plain => Box::new(PlainParser),
        }
    }
}

fn into_document(map: Map<String, Value>) -> Result<Document, InputError> {
    Document::new(map).map_err(|_| InputError::Empty)
}

pub struct JsonlParser;

impl LineParser for JsonlParser {
    fn parse_line(&self, line: &str) -> Result<Document, InputError> {
        let value: Value = serde_json::from_str(line.trim())?;
        match value {
            Value::Object(map) => into_document(map),
            other => Err(InputError::NotAnObject(crate::document::json_type_name(&other))),
        }
    }
}

pub struct PlainParser;

impl LineParser for PlainParser {
    fn parse_line(&self, line: &str) -> Result<Document, InputError> {
        let mut map = Map::new();
        map.insert(MESSAGE_FIELD.to_string(), Value::String(line.to_string()));
        into_document(map)
    }
}

pub struct LogfmtParser;

impl LogfmtParser {
    // key1=value1 key2="value with spaces" key3=value3
    fn parse_pairs(line: &str) -> Result<Vec<(String, String)>, InputError> {
        let mut pairs = Vec::new();
        let mut chars = line.chars().peekable();

        loop {
            while matches!(chars.peek(), Some(&' ') | Some(&'\t')) {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(&ch) = chars.peek() {
                if ch == '=' {
                    break;
                }
                if ch == ' ' || ch == '\t' {
                    return Err(InputError::Logfmt(format!("key '{}' has no value", key)));
                }
                key.push(ch);
                chars.next();
            }
            if key.is_empty() {
                return Err(InputError::Logfmt("empty key".to_string()));
            }
            if chars.next() != Some('=') {
                return Err(InputError::Logfmt(format!("expected '=' after key '{}'", key)));
            }

            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some(other) => value.push(other),
                            None => break,
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(InputError::Logfmt(format!("unclosed quote in value of '{}'", key)));
                }
            } else {
                while let Some(&ch) = chars.peek() {
                    if ch == ' ' || ch == '\t' {
                        break;
                    }
                    value.push(ch);
                    chars.next();
                }
            }

            pairs.push((key, value));
        }

        Ok(pairs)
    }
}

impl LineParser for LogfmtParser {
    fn parse_line(&self, line: &str) -> Result<Document, InputError> {
        let map = Self::parse_pairs(line.trim())?
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        into_document(map)
    }
}
