// src/document.rs
use crate::error::{ConfigurationError, FieldAccessError};
use serde_json::{Map, Value};
use std::fmt;

/// Structural kind of a field value, used by type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Any integral number
    Long,
    /// Any floating-point number
    Double,
    /// Integral or floating-point
    Number,
    Boolean,
    List,
    JsonObject,
}

impl FieldKind {
    /// Parse a type name as it appears in configuration (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(FieldKind::String),
            "long" | "int" | "integer" => Some(FieldKind::Long),
            "double" | "float" => Some(FieldKind::Double),
            "number" => Some(FieldKind::Number),
            "boolean" | "bool" => Some(FieldKind::Boolean),
            "list" => Some(FieldKind::List),
            "jsonobject" | "object" => Some(FieldKind::JsonObject),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Long => value.is_i64() || value.is_u64(),
            FieldKind::Double => value.is_f64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::List => value.is_array(),
            FieldKind::JsonObject => value.is_object(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Long => "long",
            FieldKind::Double => "double",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::List => "list",
            FieldKind::JsonObject => "jsonObject",
        };
        write!(f, "{}", name)
    }
}

/// The unit of work flowing through a pipeline.
///
/// `source` holds the log record itself and is addressed by dotted paths
/// (`a.b.c`). `metadata` is a separate bag for pipeline bookkeeping that
/// ordinary processors leave alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    source: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl Document {
    pub fn new(source: Map<String, Value>) -> Result<Self, ConfigurationError> {
        if source.is_empty() {
            return Err(ConfigurationError::EmptyDocument);
        }
        Ok(Document {
            source,
            metadata: Map::new(),
        })
    }

    /// Build a document from a JSON value, which must be a non-empty object
    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::Object(map) => Document::new(map),
            other => Err(ConfigurationError::Parse(format!(
                "document must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    pub fn into_source(self) -> Map<String, Value> {
        self.source
    }

    pub fn get_field(&self, path: &str) -> Option<&Value> {
        self.try_get_field(path).ok()
    }

    /// Resolve a dotted path, reporting why resolution failed
    pub fn try_get_field(&self, path: &str) -> Result<&Value, FieldAccessError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self
            .source
            .get(first)
            .ok_or_else(|| not_found(path))?;

        for segment in segments {
            match current {
                Value::Object(map) => {
                    current = map.get(segment).ok_or_else(|| not_found(path))?;
                }
                _ => {
                    return Err(FieldAccessError::NotTraversable {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            }
        }
        Ok(current)
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.get_field(path).is_some()
    }

    pub fn has_field_of_type(&self, path: &str, kind: FieldKind) -> bool {
        self.get_field(path).is_some_and(|value| kind.matches(value))
    }

    /// Set a value at `path`, creating intermediate objects as needed.
    /// Overwrites an existing leaf value.
    pub fn add_field(&mut self, path: &str, value: Value) -> Result<(), FieldAccessError> {
        let (parent, leaf) = self.parent_mut(path, true)?;
        parent.insert(leaf.to_string(), value);
        Ok(())
    }

    pub fn remove_field(&mut self, path: &str) -> Result<Value, FieldAccessError> {
        let (parent, leaf) = self.parent_mut(path, false)?;
        parent.remove(leaf).ok_or_else(|| not_found(path))
    }

    /// Check that `add_field(path, ..)` would succeed without changing anything.
    /// Fails when an existing segment on the way to the leaf is not an object.
    pub fn check_writable(&self, path: &str) -> Result<(), FieldAccessError> {
        let Some((parents, _)) = path.rsplit_once('.') else {
            return Ok(());
        };
        let mut current = &self.source;
        for segment in parents.split('.') {
            current = match current.get(segment) {
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(FieldAccessError::NotTraversable {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
                None => return Ok(()),
            };
        }
        Ok(())
    }

    /// Move a value from one path to another. On error the document is unchanged.
    pub fn rename_field(&mut self, from: &str, to: &str) -> Result<(), FieldAccessError> {
        self.try_get_field(from)?;
        self.check_writable(to)?;
        let value = self.remove_field(from)?;
        self.add_field(to, value)
    }

    /// Append values to the list at `path`. A missing path becomes a new list;
    /// an existing non-list value is rejected rather than coerced.
    pub fn append_to_list(&mut self, path: &str, values: Vec<Value>) -> Result<(), FieldAccessError> {
        let (parent, leaf) = self.parent_mut(path, true)?;
        match parent.get_mut(leaf) {
            Some(Value::Array(list)) => list.extend(values),
            Some(_) => {
                return Err(FieldAccessError::NotAList {
                    path: path.to_string(),
                })
            }
            None => {
                parent.insert(leaf.to_string(), Value::Array(values));
            }
        }
        Ok(())
    }

    /// Remove every occurrence of `values` from the list at `path`.
    /// A missing path is a no-op.
    pub fn remove_from_list(&mut self, path: &str, values: &[Value]) -> Result<(), FieldAccessError> {
        let parent = match self.parent_mut(path, false) {
            Ok((parent, leaf)) => parent.get_mut(leaf),
            Err(FieldAccessError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        match parent {
            Some(Value::Array(list)) => {
                list.retain(|item| !values.contains(item));
                Ok(())
            }
            Some(_) => Err(FieldAccessError::NotAList {
                path: path.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Walk to the object holding the last segment of `path`
    fn parent_mut<'p>(
        &mut self,
        path: &'p str,
        create: bool,
    ) -> Result<(&mut Map<String, Value>, &'p str), FieldAccessError> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut current = &mut self.source;
        if let Some(parents) = parents {
            for segment in parents.split('.') {
                if create && !current.contains_key(segment) {
                    current.insert(segment.to_string(), Value::Object(Map::new()));
                }
                current = match current.get_mut(segment) {
                    Some(Value::Object(map)) => map,
                    Some(_) => {
                        return Err(FieldAccessError::NotTraversable {
                            path: path.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                    None => return Err(not_found(path)),
                };
            }
        }
        Ok((current, leaf))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.source) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<unprintable document>"),
        }
    }
}

fn not_found(path: &str) -> FieldAccessError {
    FieldAccessError::NotFound {
        path: path.to_string(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Render a value as plain text: strings without quotes, everything else as JSON
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(matches!(
            Document::new(Map::new()),
            Err(ConfigurationError::EmptyDocument)
        ));
        assert!(Document::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_nested_get() {
        let d = doc(json!({"a": {"b": {"c": 1}}, "x": "y"}));
        assert_eq!(d.get_field("a.b.c"), Some(&json!(1)));
        assert_eq!(d.get_field("x"), Some(&json!("y")));
        assert!(d.get_field("a.b.missing").is_none());
    }

    #[test]
    fn test_not_found_vs_not_traversable() {
        let d = doc(json!({"a": {"b": "leaf"}}));
        assert!(matches!(
            d.try_get_field("a.z"),
            Err(FieldAccessError::NotFound { .. })
        ));
        assert!(matches!(
            d.try_get_field("a.b.c"),
            Err(FieldAccessError::NotTraversable { .. })
        ));
    }

    #[test]
    fn test_add_creates_intermediate_objects() {
        let mut d = doc(json!({"message": "hi"}));
        d.add_field("http.request.method", json!("GET")).unwrap();
        assert_eq!(d.get_field("http.request.method"), Some(&json!("GET")));

        d.add_field("message.inner", json!(1)).unwrap_err();
    }

    #[test]
    fn test_remove_field() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(d.remove_field("a.b").unwrap(), json!(1));
        assert!(!d.has_field("a.b"));
        assert!(d.has_field("a.c"));
        assert!(matches!(
            d.remove_field("a.b"),
            Err(FieldAccessError::NotFound { .. })
        ));
    }

    #[test]
    fn test_append_and_remove_from_list() {
        let mut d = doc(json!({"msg": "x"}));
        d.append_to_list("tags", vec![json!("a"), json!("b")]).unwrap();
        d.append_to_list("tags", vec![json!("c")]).unwrap();
        assert_eq!(d.get_field("tags"), Some(&json!(["a", "b", "c"])));

        d.remove_from_list("tags", &[json!("b")]).unwrap();
        assert_eq!(d.get_field("tags"), Some(&json!(["a", "c"])));

        d.remove_from_list("nothing.here", &[json!("a")]).unwrap();

        assert!(matches!(
            d.append_to_list("msg", vec![json!(1)]),
            Err(FieldAccessError::NotAList { .. })
        ));
    }

    #[test]
    fn test_has_field_of_type() {
        let d = doc(json!({"n": 3, "f": 1.5, "s": "x", "l": [], "o": {}}));
        assert!(d.has_field_of_type("n", FieldKind::Long));
        assert!(!d.has_field_of_type("n", FieldKind::Double));
        assert!(d.has_field_of_type("f", FieldKind::Double));
        assert!(d.has_field_of_type("f", FieldKind::Number));
        assert!(d.has_field_of_type("l", FieldKind::List));
        assert!(d.has_field_of_type("o", FieldKind::JsonObject));
        assert!(!d.has_field_of_type("missing", FieldKind::String));
    }

    #[test]
    fn test_rename_moves_value() {
        let mut d = doc(json!({"old": {"k": 1}}));
        d.rename_field("old.k", "new.k").unwrap();
        assert_eq!(d.get_field("new.k"), Some(&json!(1)));
        assert!(!d.has_field("old.k"));
    }

    #[test]
    fn test_failed_rename_keeps_source() {
        let mut d = doc(json!({"a": 1, "b": "str"}));
        let err = d.rename_field("a", "b.c").unwrap_err();
        assert!(matches!(err, FieldAccessError::NotTraversable { .. }));
        assert_eq!(d.get_field("a"), Some(&json!(1)));
        assert_eq!(d.get_field("b"), Some(&json!("str")));

        assert!(d.rename_field("missing", "x").is_err());
        assert!(!d.has_field("x"));
    }

    #[test]
    fn test_check_writable() {
        let d = doc(json!({"a": {"b": 1}, "s": "x"}));
        assert!(d.check_writable("top").is_ok());
        assert!(d.check_writable("a.c").is_ok());
        assert!(d.check_writable("new.deep.path").is_ok());
        assert!(d.check_writable("s.x").is_err());
        assert!(d.check_writable("a.b.c").is_err());
    }
}
