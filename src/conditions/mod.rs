// src/conditions/mod.rs
//
// Predicates gating processor nodes. Built once from configuration,
// evaluated read-only, and never fail: a missing or mistyped field is `false`.
use crate::document::{value_to_string, Document, FieldKind};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

pub mod registry;

pub use registry::{ConditionFactory, ConditionParser, ConditionRegistry};

/// Extension point for condition types registered outside this crate
pub trait CustomCondition: Send + Sync + fmt::Debug {
    fn evaluate(&self, doc: &Document) -> bool;
}

#[derive(Debug, Clone)]
pub enum Condition {
    /// True when every child is true. An empty list is true.
    And(Vec<Condition>),
    /// True when any child is true. An empty list is false.
    Or(Vec<Condition>),
    /// True when no child is true
    Not(Vec<Condition>),
    /// True when every listed path resolves
    Exists(Vec<String>),
    FieldHasValue { field: String, values: Vec<Value> },
    FieldType { path: String, kind: FieldKind },
    /// List field contains `value`, or string field contains it as a substring
    In { path: String, value: Value },
    IpRange(IpRange),
    MatchRegex(MatchRegex),
    MathComparator(MathComparator),
    Custom(Arc<dyn CustomCondition>),
}

impl Condition {
    pub fn evaluate(&self, doc: &Document) -> bool {
        match self {
            Condition::And(children) => children.iter().all(|c| c.evaluate(doc)),
            Condition::Or(children) => children.iter().any(|c| c.evaluate(doc)),
            Condition::Not(children) => !children.iter().any(|c| c.evaluate(doc)),
            Condition::Exists(paths) => paths.iter().all(|p| doc.has_field(p)),
            Condition::FieldHasValue { field, values } => doc
                .get_field(field)
                .is_some_and(|value| values.contains(value)),
            Condition::FieldType { path, kind } => doc.has_field_of_type(path, *kind),
            Condition::In { path, value } => match (doc.get_field(path), value) {
                (Some(Value::Array(list)), needle) => list.contains(needle),
                (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle.as_str()),
                _ => false,
            },
            Condition::IpRange(range) => range.evaluate(doc),
            Condition::MatchRegex(matcher) => matcher.evaluate(doc),
            Condition::MathComparator(comparator) => comparator.evaluate(doc),
            Condition::Custom(custom) => custom.evaluate(doc),
        }
    }
}

/// Inclusive range of addresses of one family
#[derive(Debug, Clone)]
pub struct IpRange {
    field: String,
    low: IpAddr,
    high: IpAddr,
}

impl IpRange {
    /// Returns `None` when the bounds belong to different address families
    pub fn new(field: &str, low: IpAddr, high: IpAddr) -> Option<Self> {
        if low.is_ipv4() != high.is_ipv4() {
            return None;
        }
        Some(IpRange {
            field: field.to_string(),
            low,
            high,
        })
    }

    fn evaluate(&self, doc: &Document) -> bool {
        let Some(value) = doc.get_field(&self.field) else {
            return false;
        };
        let Ok(ip) = value_to_string(value).trim().parse::<IpAddr>() else {
            return false;
        };
        match (ip, self.low, self.high) {
            (IpAddr::V4(ip), IpAddr::V4(low), IpAddr::V4(high)) => {
                let ip = u32::from(ip);
                u32::from(low) <= ip && ip <= u32::from(high)
            }
            (IpAddr::V6(ip), IpAddr::V6(low), IpAddr::V6(high)) => {
                let ip = u128::from(ip);
                u128::from(low) <= ip && ip <= u128::from(high)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchRegex {
    field: String,
    regex: Regex,
}

impl MatchRegex {
    /// `regex` is expected to be anchored already when whole-value matching is wanted
    pub fn new(field: &str, regex: Regex) -> Self {
        MatchRegex {
            field: field.to_string(),
            regex,
        }
    }

    fn evaluate(&self, doc: &Document) -> bool {
        doc.get_field(&self.field)
            .is_some_and(|value| self.regex.is_match(&value_to_string(value)))
    }
}

/// Up to four independent numeric bounds; absent bounds always pass
#[derive(Debug, Clone, Default)]
pub struct MathComparator {
    pub field: String,
    pub gte: Option<f64>,
    pub gt: Option<f64>,
    pub lte: Option<f64>,
    pub lt: Option<f64>,
}

impl MathComparator {
    fn evaluate(&self, doc: &Document) -> bool {
        let Some(n) = doc.get_field(&self.field).and_then(Value::as_f64) else {
            return false;
        };
        self.gte.map_or(true, |b| n >= b)
            && self.gt.map_or(true, |b| n > b)
            && self.lte.map_or(true, |b| n <= b)
            && self.lt.map_or(true, |b| n < b)
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
    fn test_empty_composites() {
        let d = doc(json!({"a": 1}));
        assert!(Condition::And(vec![]).evaluate(&d));
        assert!(!Condition::Or(vec![]).evaluate(&d));
    }

    #[test]
    fn test_math_comparator_bounds() {
        let cond = Condition::MathComparator(MathComparator {
            field: "n".to_string(),
            gte: Some(10.0),
            lt: Some(20.0),
            ..Default::default()
        });
        assert!(cond.evaluate(&doc(json!({"n": 10}))));
        assert!(cond.evaluate(&doc(json!({"n": 19}))));
        assert!(!cond.evaluate(&doc(json!({"n": 9}))));
        assert!(!cond.evaluate(&doc(json!({"n": 20}))));
        assert!(!cond.evaluate(&doc(json!({"other": 15}))));
        assert!(!cond.evaluate(&doc(json!({"n": "15"}))));
    }

    #[test]
    fn test_ip_range() {
        let range = IpRange::new(
            "ip",
            "10.0.0.1".parse().unwrap(),
            "10.0.0.255".parse().unwrap(),
        )
        .unwrap();
        let cond = Condition::IpRange(range);
        assert!(cond.evaluate(&doc(json!({"ip": "10.0.0.5"}))));
        assert!(!cond.evaluate(&doc(json!({"ip": "10.0.1.5"}))));
        assert!(!cond.evaluate(&doc(json!({"ip": "not an ip"}))));
        assert!(!cond.evaluate(&doc(json!({"ip": "::1"}))));

        assert!(IpRange::new("ip", "10.0.0.1".parse().unwrap(), "::1".parse().unwrap()).is_none());
    }

    #[test]
    fn test_in_condition() {
        let list = Condition::In {
            path: "tags".to_string(),
            value: json!("prod"),
        };
        assert!(list.evaluate(&doc(json!({"tags": ["dev", "prod"]}))));
        assert!(!list.evaluate(&doc(json!({"tags": ["dev"]}))));
        assert!(list.evaluate(&doc(json!({"tags": "preproduction"}))));
        assert!(!list.evaluate(&doc(json!({"other": 1}))));
    }

    #[test]
    fn test_not_condition() {
        let cond = Condition::Not(vec![Condition::Exists(vec!["a".to_string()])]);
        assert!(!cond.evaluate(&doc(json!({"a": 1}))));
        assert!(cond.evaluate(&doc(json!({"b": 1}))));
    }
}
