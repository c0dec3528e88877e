// src/grok.rs - Grok pattern compiler and typed field extraction
use crate::error::ConfigurationError;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

const DEFAULT_PATTERNS: &str = include_str!("grok/default-patterns");

/// Upper bound on macro substitutions for one expression
const MAX_EXPANSIONS: usize = 1000;

/// Expanded library patterns (unicode classes, IPv6) outgrow the regex crate's default limit
const REGEX_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Matches `%{NAME}`, `%{NAME:field}`, `%{NAME:field:type}` and `%{NAME=definition}`
static MACRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"%\{(?P<pattern>[A-Za-z0-9_]+)(?::(?P<subname>[A-Za-z0-9_@:;,\-/\s.']+))?(?:=(?P<definition>[^{}]+))?\}",
    )
    .unwrap()
});

static PATTERN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Type tag attached to a captured field (`%{INT:count:long}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
}

impl CaptureType {
    fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "string" => Some(CaptureType::String),
            "int" => Some(CaptureType::Int),
            "long" => Some(CaptureType::Long),
            "float" => Some(CaptureType::Float),
            "double" => Some(CaptureType::Double),
            "boolean" | "bool" => Some(CaptureType::Boolean),
            _ => None,
        }
    }

    /// Coerce a captured substring. Conversion failures keep the raw string.
    fn convert(&self, text: &str) -> Value {
        match self {
            CaptureType::String => Value::String(text.to_string()),
            CaptureType::Int | CaptureType::Long => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(text.to_string())),
            CaptureType::Float | CaptureType::Double => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.to_string())),
            CaptureType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(text.to_string()),
            },
        }
    }
}

/// Field name and type parsed from a macro's subname
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub capture_type: CaptureType,
}

impl FieldSpec {
    /// Parse `field` or `field:type`
    fn parse(spec: &str) -> Result<Self, ConfigurationError> {
        let (name, tag) = match spec.split_once(':') {
            Some((name, tag)) => (name.trim(), tag),
            None => (spec.trim(), ""),
        };
        if name.is_empty() {
            return Err(ConfigurationError::InvalidPattern {
                pattern: spec.to_string(),
                message: "empty field name".to_string(),
            });
        }
        let capture_type = CaptureType::parse(tag).ok_or_else(|| ConfigurationError::InvalidPattern {
            pattern: spec.to_string(),
            message: format!(
                "unknown type '{}'. Supported types: string, int, long, float, double, boolean",
                tag
            ),
        })?;
        Ok(FieldSpec {
            name: name.to_string(),
            capture_type,
        })
    }
}

/// All regex groups that feed one output field
#[derive(Debug, Clone)]
struct CaptureField {
    capture_type: CaptureType,
    groups: Vec<String>,
}

/// Named-pattern bank plus the compiler that expands grok expressions against it.
///
/// Compiling an expression with an inline definition (`%{NAME=regex}`) registers
/// that definition in the bank, so later references to `NAME` reuse it.
#[derive(Debug, Clone, Default)]
pub struct GrokCompiler {
    patterns: IndexMap<String, String>,
}

impl GrokCompiler {
    /// An empty pattern bank
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank seeded with the bundled patterns (WORD, INT, IP, TIMESTAMP_ISO8601, ...)
    pub fn with_default_patterns() -> Self {
        let mut compiler = Self::new();
        if let Err(e) = compiler.add_patterns_from_str(DEFAULT_PATTERNS) {
            tracing::error!("Bundled grok patterns failed to load: {}", e);
        }
        compiler
    }

    pub fn add_pattern(&mut self, name: &str, regex: &str) {
        self.patterns.insert(name.to_string(), regex.to_string());
    }

    /// Load patterns in `NAME regex` line format. Blank lines and `#` comments are skipped.
    pub fn add_patterns_from_str(&mut self, text: &str) -> Result<usize, ConfigurationError> {
        let mut added = 0;
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, regex) = line
                .split_once(char::is_whitespace)
                .map(|(name, regex)| (name, regex.trim()))
                .ok_or_else(|| ConfigurationError::InvalidPattern {
                    pattern: line.to_string(),
                    message: format!("line {}: expected 'NAME regex'", index + 1),
                })?;
            if !PATTERN_NAME.is_match(name) || regex.is_empty() {
                return Err(ConfigurationError::InvalidPattern {
                    pattern: line.to_string(),
                    message: format!("line {}: expected 'NAME regex'", index + 1),
                });
            }
            self.add_pattern(name, regex);
            added += 1;
        }
        Ok(added)
    }

    pub fn pattern(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Expand every macro in `expression` and compile the result.
    ///
    /// With `named_only`, references without a field name become non-capturing
    /// groups; otherwise they are captured under the pattern name.
    pub fn compile(&mut self, expression: &str, named_only: bool) -> Result<Grok, ConfigurationError> {
        let (expanded, fields) = self.expand(expression, named_only)?;

        let regex = RegexBuilder::new(&expanded)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|source| ConfigurationError::InvalidRegex {
                pattern: expression.to_string(),
                source,
            })?;

        tracing::debug!(
            "Compiled grok expression '{}' with {} fields",
            expression,
            fields.len()
        );

        Ok(Grok {
            expression: expression.to_string(),
            expanded,
            regex,
            fields,
        })
    }

    /// Repeatedly substitute the left-most macro until none remain
    fn expand(
        &mut self,
        expression: &str,
        named_only: bool,
    ) -> Result<(String, IndexMap<String, CaptureField>), ConfigurationError> {
        let mut expanded = expression.to_string();
        let mut fields: IndexMap<String, CaptureField> = IndexMap::new();
        let mut group_index = 0;
        let mut expansions = 0;

        while let Some(caps) = MACRO.captures(&expanded) {
            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                return Err(ConfigurationError::RecursivePattern(expression.to_string()));
            }

            let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
            let pattern = caps["pattern"].to_string();
            let subname = caps.name("subname").map(|m| m.as_str().to_string());

            if let Some(definition) = caps.name("definition") {
                self.add_pattern(&pattern, definition.as_str());
            }

            let fragment = self
                .patterns
                .get(&pattern)
                .ok_or_else(|| ConfigurationError::UnknownPattern(pattern.clone()))?;

            drop(caps);

            let replacement = match (&subname, named_only) {
                (None, true) => format!("(?:{})", fragment),
                _ => {
                    let spec = FieldSpec::parse(subname.as_deref().unwrap_or(&pattern))?;
                    let group = format!("name{}", group_index);
                    group_index += 1;
                    let replacement = format!("(?P<{}>{})", group, fragment);
                    fields
                        .entry(spec.name)
                        .or_insert_with(|| CaptureField {
                            capture_type: spec.capture_type,
                            groups: Vec::new(),
                        })
                        .groups
                        .push(group);
                    replacement
                }
            };

            expanded.replace_range(range, &replacement);
        }

        Ok((expanded, fields))
    }
}

/// A compiled grok expression
#[derive(Debug, Clone)]
pub struct Grok {
    expression: String,
    expanded: String,
    regex: Regex,
    fields: IndexMap<String, CaptureField>,
}

impl Grok {
    /// The expression as written, before expansion
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The fully expanded regular expression
    pub fn expanded(&self) -> &str {
        &self.expanded
    }

    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn field_type(&self, name: &str) -> Option<CaptureType> {
        self.fields.get(name).map(|f| f.capture_type)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Match `text` and extract typed fields.
    ///
    /// Returns `None` when the expression does not match. A field whose name
    /// occurs in several groups that all participate yields a list.
    pub fn captures(&self, text: &str) -> Option<Map<String, Value>> {
        let caps = self.regex.captures(text)?;
        let mut result = Map::new();

        for (name, field) in &self.fields {
            let mut values: Vec<Value> = field
                .groups
                .iter()
                .filter_map(|group| caps.name(group))
                .map(|m| field.capture_type.convert(m.as_str()))
                .collect();

            match values.len() {
                0 => {}
                1 => {
                    result.insert(name.clone(), values.remove(0));
                }
                _ => {
                    result.insert(name.clone(), Value::Array(values));
                }
            }
        }

        Some(result)
    }
}
