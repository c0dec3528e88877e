// src/template.rs
use crate::document::{value_to_string, Document};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_@.\-]+)\s*\}\}").unwrap());

/// A string with `{{field.path}}` placeholders resolved against a document.
/// Placeholders whose field is missing render as an empty string.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    has_placeholders: bool,
}

impl Template {
    pub fn new(raw: &str) -> Self {
        Template {
            raw: raw.to_string(),
            has_placeholders: PLACEHOLDER.is_match(raw),
        }
    }

    pub fn is_static(&self) -> bool {
        !self.has_placeholders
    }

    pub fn render(&self, doc: &Document) -> String {
        if !self.has_placeholders {
            return self.raw.clone();
        }
        PLACEHOLDER
            .replace_all(&self.raw, |caps: &Captures| {
                doc.get_field(&caps[1])
                    .map(value_to_string)
                    .unwrap_or_default()
            })
            .into_owned()
    }
}
