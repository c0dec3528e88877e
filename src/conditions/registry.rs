// src/conditions/registry.rs
use super::{Condition, IpRange, MatchRegex, MathComparator};
use crate::document::FieldKind;
use crate::error::ConfigurationError;
use regex::RegexBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Builds a condition from its configuration. Composite conditions use
/// `parser` to build their children.
pub trait ConditionFactory: Send + Sync {
    fn create(&self, config: &Value, parser: &ConditionParser) -> Result<Condition, ConfigurationError>;
}

impl<F> ConditionFactory for F
where
    F: Fn(&Value, &ConditionParser) -> Result<Condition, ConfigurationError> + Send + Sync,
{
    fn create(&self, config: &Value, parser: &ConditionParser) -> Result<Condition, ConfigurationError> {
        self(config, parser)
    }
}

/// Condition type name -> factory
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    factories: HashMap<String, Arc<dyn ConditionFactory>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("and", build_and);
        registry.register("or", build_or);
        registry.register("not", build_not);
        registry.register("exists", build_exists);
        registry.register("hasValue", build_has_value);
        registry.register("fieldType", build_field_type);
        registry.register("in", build_in);
        registry.register("ipRange", build_ip_range);
        registry.register("matchRegex", build_match_regex);
        registry.register("mathComparator", build_math_comparator);
        registry
    }

    pub fn register(&mut self, name: &str, factory: impl ConditionFactory + 'static) {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ConditionFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Turns `{ "<type>": <config> }` into a `Condition` using a registry
#[derive(Clone)]
pub struct ConditionParser {
    registry: Arc<ConditionRegistry>,
}

impl ConditionParser {
    pub fn new(registry: Arc<ConditionRegistry>) -> Self {
        ConditionParser { registry }
    }

    pub fn parse(&self, config: &Value) -> Result<Condition, ConfigurationError> {
        let object = config
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| {
                ConfigurationError::invalid(
                    "condition",
                    format!("expected a single-key object {{\"<type>\": {{...}}}}, got {}", config),
                )
            })?;

        let (name, inner) = object
            .iter()
            .next()
            .ok_or_else(|| ConfigurationError::invalid("condition", "empty condition"))?;

        let factory = self
            .registry
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownCondition(name.clone()))?;

        factory.create(inner, self)
    }
}

impl Default for ConditionParser {
    fn default() -> Self {
        ConditionParser::new(Arc::new(ConditionRegistry::with_builtins()))
    }
}

fn parse_config<T: DeserializeOwned>(name: &str, config: &Value) -> Result<T, ConfigurationError> {
    serde_json::from_value(config.clone()).map_err(|e| ConfigurationError::invalid(name, e.to_string()))
}

fn parse_children(
    name: &str,
    config: &Value,
    parser: &ConditionParser,
) -> Result<Vec<Condition>, ConfigurationError> {
    let children = config
        .as_array()
        .ok_or_else(|| ConfigurationError::invalid(name, "expected a list of conditions"))?;
    children.iter().map(|child| parser.parse(child)).collect()
}

fn build_and(config: &Value, parser: &ConditionParser) -> Result<Condition, ConfigurationError> {
    Ok(Condition::And(parse_children("and", config, parser)?))
}

fn build_or(config: &Value, parser: &ConditionParser) -> Result<Condition, ConfigurationError> {
    Ok(Condition::Or(parse_children("or", config, parser)?))
}

fn build_not(config: &Value, parser: &ConditionParser) -> Result<Condition, ConfigurationError> {
    Ok(Condition::Not(parse_children("not", config, parser)?))
}

/// Accepts either `"a"` or `["a", "b"]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExistsConfig {
    field: OneOrMany,
}

fn build_exists(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: ExistsConfig = parse_config("exists", config)?;
    let fields = cfg.field.into_vec();
    if fields.is_empty() {
        return Err(ConfigurationError::invalid("exists", "at least one field is required"));
    }
    Ok(Condition::Exists(fields))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct HasValueConfig {
    field: String,
    possible_values: Vec<Value>,
}

fn build_has_value(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: HasValueConfig = parse_config("hasValue", config)?;
    Ok(Condition::FieldHasValue {
        field: cfg.field,
        values: cfg.possible_values,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldTypeConfig {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

fn build_field_type(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: FieldTypeConfig = parse_config("fieldType", config)?;
    let kind = FieldKind::parse(&cfg.kind).ok_or_else(|| {
        ConfigurationError::invalid(
            "fieldType",
            format!(
                "unsupported type '{}'. Supported types: string, long, double, number, boolean, list, jsonObject",
                cfg.kind
            ),
        )
    })?;
    Ok(Condition::FieldType { path: cfg.path, kind })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InConfig {
    path: String,
    value: Value,
}

fn build_in(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: InConfig = parse_config("in", config)?;
    Ok(Condition::In {
        path: cfg.path,
        value: cfg.value,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct IpRangeConfig {
    field: String,
    from_ip: String,
    to_ip: String,
}

fn build_ip_range(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: IpRangeConfig = parse_config("ipRange", config)?;
    let parse_ip = |s: &str| {
        s.trim()
            .parse::<IpAddr>()
            .map_err(|e| ConfigurationError::invalid("ipRange", format!("invalid address '{}': {}", s, e)))
    };
    let low = parse_ip(&cfg.from_ip)?;
    let high = parse_ip(&cfg.to_ip)?;
    let range = IpRange::new(&cfg.field, low, high)
        .ok_or_else(|| ConfigurationError::invalid("ipRange", "fromIp and toIp must be the same address family"))?;
    Ok(Condition::IpRange(range))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct MatchRegexConfig {
    field: String,
    regex: String,
    #[serde(default)]
    case_insensitive: bool,
    #[serde(default = "default_true")]
    match_part_of_value: bool,
}

fn build_match_regex(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: MatchRegexConfig = parse_config("matchRegex", config)?;
    let pattern = if cfg.match_part_of_value {
        cfg.regex.clone()
    } else {
        format!("^(?:{})$", cfg.regex)
    };
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(cfg.case_insensitive)
        .build()
        .map_err(|source| ConfigurationError::InvalidRegex {
            pattern: cfg.regex.clone(),
            source,
        })?;
    Ok(Condition::MatchRegex(MatchRegex::new(&cfg.field, regex)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MathComparatorConfig {
    field: String,
    gte: Option<f64>,
    gt: Option<f64>,
    lte: Option<f64>,
    lt: Option<f64>,
}

fn build_math_comparator(config: &Value, _: &ConditionParser) -> Result<Condition, ConfigurationError> {
    let cfg: MathComparatorConfig = parse_config("mathComparator", config)?;
    if cfg.gte.is_none() && cfg.gt.is_none() && cfg.lte.is_none() && cfg.lt.is_none() {
        return Err(ConfigurationError::invalid(
            "mathComparator",
            "at least one of gte, gt, lte, lt is required",
        ));
    }
    Ok(Condition::MathComparator(MathComparator {
        field: cfg.field,
        gte: cfg.gte,
        gt: cfg.gt,
        lte: cfg.lte,
        lt: cfg.lt,
    }))
}
