// tests/pipeline_execution_tests.rs
use sawlog::{
    ConditionParser, ConfigurationError, Document, ExecutionOutcome, GrokCompiler,
    InMemoryMetricsTracker, MetricsTracker, NodeState, Pipeline, PipelineExecutor,
    PipelineFactory, ProcessResult, Processor, ProcessorRegistry,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

struct FailingProcessor;

impl Processor for FailingProcessor {
    fn process(&self, _doc: &mut Document) -> ProcessResult {
        ProcessResult::error("fail", "boom")
    }

    fn name(&self) -> &str {
        "fail"
    }
}

fn factory() -> PipelineFactory {
    let mut registry = ProcessorRegistry::with_builtins(GrokCompiler::with_default_patterns());
    registry.register(
        "fail",
        |_: &Map<String, Value>| -> Result<Box<dyn Processor>, ConfigurationError> {
            Ok(Box::new(FailingProcessor))
        },
    );
    PipelineFactory::new(Arc::new(registry), ConditionParser::default())
}

fn pipeline(definition: Value) -> Pipeline {
    factory().build_from_json(&definition.to_string()).unwrap()
}

fn executor() -> (PipelineExecutor, Arc<InMemoryMetricsTracker>) {
    let metrics = Arc::new(InMemoryMetricsTracker::new());
    (PipelineExecutor::new(metrics.clone()), metrics)
}

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

#[test]
fn test_all_processors_succeed() {
    println!("=== Testing successful pipeline ===");

    let p = pipeline(json!({
        "id": "web",
        "processors": [
            {"name": "addField", "config": {"path": "env", "value": "prod"}},
            {"name": "rename", "config": {"from": "msg", "to": "message"}}
        ]
    }));
    let (exec, metrics) = executor();
    let mut d = doc(json!({"msg": "hello"}));

    let report = exec.execute_with_report(&p, &mut d).unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Succeeded);
    assert_eq!(report.count(NodeState::Succeeded), 2);
    assert_eq!(d.get_field("env"), Some(&json!("prod")));
    assert_eq!(d.get_field("message"), Some(&json!("hello")));
    assert_eq!(d.metadata().get("status"), Some(&json!("succeeded")));
    assert!(d.metadata().contains_key("ingestTimestamp"));
    assert_eq!(metrics.total_succeeded(), 1);
    assert_eq!(metrics.processor_stats("addField").unwrap().count, 1);
    println!("✓ Both processors applied, metadata stamped");
}

#[test]
fn test_ignored_failure_continues() {
    println!("=== Testing ignoreFailure ===");

    let p = pipeline(json!({
        "processors": [
            {"name": "fail", "ignoreFailure": true},
            {"name": "addField", "config": {"path": "after", "value": true}}
        ]
    }));
    let (exec, metrics) = executor();
    let mut d = doc(json!({"a": 1}));

    let report = exec.execute_with_report(&p, &mut d).unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Succeeded);
    assert_eq!(report.count(NodeState::FailedRecovered), 1);
    assert_eq!(d.get_field("after"), Some(&json!(true)));
    assert_eq!(metrics.total_failed(), 0);
    println!("✓ Later processor ran after recovered failure");
}

#[test]
fn test_recovered_rename_failure_keeps_source_field() {
    println!("=== Testing failed rename under ignoreFailure ===");

    let p = pipeline(json!({
        "processors": [
            {"name": "rename", "config": {"from": "a", "to": "b.c"}, "ignoreFailure": true}
        ]
    }));
    let (exec, _) = executor();
    let mut d = doc(json!({"a": 1, "b": "str"}));

    let report = exec.execute_with_report(&p, &mut d).unwrap();

    assert_eq!(report.count(NodeState::FailedRecovered), 1);
    assert_eq!(d.get_field("a"), Some(&json!(1)));
    assert_eq!(d.get_field("b"), Some(&json!("str")));
    println!("✓ Source field survived the failed rename");
}

#[test]
fn test_fatal_failure_stops_pipeline() {
    println!("=== Testing fatal failure ===");

    let p = pipeline(json!({
        "id": "strict",
        "processors": [
            {"name": "addField", "config": {"path": "before", "value": 1}},
            {"name": "fail"},
            {"name": "addField", "config": {"path": "after", "value": 2}}
        ]
    }));
    let (exec, metrics) = executor();
    let mut d = doc(json!({"a": 1}));

    let err = exec.execute(&p, &mut d).unwrap_err();

    assert_eq!(err.pipeline_id, "strict");
    assert_eq!(err.processor, "fail");
    assert_eq!(err.source.message, "boom");
    assert!(d.has_field("before"));
    assert!(!d.has_field("after"));
    assert_eq!(d.metadata().get("status"), Some(&json!("failed")));
    assert_eq!(metrics.total_failed(), 1);
    assert_eq!(metrics.failures_for("strict"), 1);
    println!("✓ Error names the failing processor: {}", err);
}

#[test]
fn test_on_failure_chain_runs_before_policy() {
    println!("=== Testing on-failure chains ===");

    let recovered = pipeline(json!({
        "processors": [
            {
                "name": "fail",
                "ignoreFailure": true,
                "onFailureProcessors": [{"name": "addTag", "config": {"tags": "_failed"}}]
            },
            {"name": "addField", "config": {"path": "after", "value": 1}}
        ]
    }));
    let (exec, _) = executor();
    let mut d = doc(json!({"a": 1}));
    let report = exec.execute_with_report(&recovered, &mut d).unwrap();
    assert_eq!(d.get_field("tags"), Some(&json!(["_failed"])));
    assert!(d.has_field("after"));
    assert!(report.nodes.iter().any(|n| n.depth == 1 && n.state == NodeState::Succeeded));
    println!("✓ On-failure chain ran, then the pipeline continued");

    let fatal = pipeline(json!({
        "processors": [
            {
                "name": "fail",
                "onFailureProcessors": [{"name": "addTag", "config": {"tags": "_failed"}}]
            },
            {"name": "addField", "config": {"path": "after", "value": 1}}
        ]
    }));
    let mut d = doc(json!({"a": 1}));
    assert!(exec.execute(&fatal, &mut d).is_err());
    assert_eq!(d.get_field("tags"), Some(&json!(["_failed"])));
    assert!(!d.has_field("after"));
    println!("✓ On-failure chain ran, then the failure stayed fatal");
}

#[test]
fn test_failure_inside_on_failure_chain_is_not_fatal() {
    println!("=== Testing failing on-failure chain ===");

    let p = pipeline(json!({
        "processors": [
            {"name": "fail", "ignoreFailure": true, "onFailureProcessors": [{"name": "fail"}]},
            {"name": "addField", "config": {"path": "after", "value": 1}}
        ]
    }));
    let (exec, _) = executor();
    let mut d = doc(json!({"a": 1}));

    let outcome = exec.execute(&p, &mut d).unwrap();
    assert_eq!(outcome, ExecutionOutcome::Succeeded);
    assert!(d.has_field("after"));
    println!("✓ Nested failure was only logged");
}

#[test]
fn test_condition_skips_node() {
    println!("=== Testing conditional nodes ===");

    let p = pipeline(json!({
        "processors": [
            {
                "name": "addField",
                "config": {"path": "flagged", "value": true},
                "condition": {"exists": {"field": "error"}}
            },
            {
                "name": "addField",
                "config": {"path": "big", "value": true},
                "condition": {"mathComparator": {"field": "size", "gte": 100}}
            }
        ]
    }));
    let (exec, _) = executor();
    let mut d = doc(json!({"size": 500}));

    let report = exec.execute_with_report(&p, &mut d).unwrap();

    assert_eq!(report.count(NodeState::Skipped), 1);
    assert!(!d.has_field("flagged"));
    assert_eq!(d.get_field("big"), Some(&json!(true)));
    println!("✓ Unmet condition skipped its node");
}

#[test]
fn test_drop_stops_pipeline() {
    println!("=== Testing drop ===");

    let p = pipeline(json!({
        "processors": [
            {"name": "drop", "condition": {"hasValue": {"field": "level", "possibleValues": ["debug"]}}},
            {"name": "addField", "config": {"path": "kept", "value": true}}
        ]
    }));
    let (exec, metrics) = executor();

    let mut debug = doc(json!({"level": "debug"}));
    assert_eq!(exec.execute(&p, &mut debug).unwrap(), ExecutionOutcome::Dropped);
    assert!(!debug.has_field("kept"));
    assert_eq!(debug.metadata().get("status"), Some(&json!("dropped")));

    let mut info = doc(json!({"level": "info"}));
    assert_eq!(exec.execute(&p, &mut info).unwrap(), ExecutionOutcome::Succeeded);
    assert!(info.has_field("kept"));

    assert_eq!(metrics.total_dropped(), 1);
    assert_eq!(metrics.total_succeeded(), 1);
    assert_eq!(metrics.total_processed(), 2);
    println!("✓ Dropped document skipped the rest of the chain");
}

#[test]
fn test_grok_pipeline() {
    println!("=== Testing grok + date pipeline ===");

    let p = pipeline(json!({
        "processors": [
            {"name": "grok", "config": {"field": "message", "patterns": ["%{COMMONAPACHELOG}"]}},
            {"name": "date", "config": {"field": "timestamp", "formats": ["%d/%b/%Y:%H:%M:%S %z"]}},
            {"name": "removeField", "config": {"fields": ["message", "timestamp"]}}
        ]
    }));
    let (exec, _) = executor();
    let mut d = doc(json!({
        "message": r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#
    }));

    exec.execute(&p, &mut d).unwrap();

    assert_eq!(d.get_field("clientip"), Some(&json!("127.0.0.1")));
    assert_eq!(d.get_field("verb"), Some(&json!("GET")));
    assert_eq!(d.get_field("response"), Some(&json!(200)));
    assert_eq!(d.get_field("bytes"), Some(&json!(2326)));
    assert_eq!(d.get_field("@timestamp"), Some(&json!("2000-10-10T20:55:36.000Z")));
    assert!(!d.has_field("message"));
    println!("✓ Apache line parsed: {}", d);
}

#[test]
fn test_configuration_errors() {
    println!("=== Testing configuration errors ===");

    let f = factory();
    let unknown = f.build_from_json(r#"{"processors": [{"name": "nope"}]}"#);
    assert!(matches!(unknown, Err(ConfigurationError::UnknownProcessor(ref n)) if n == "nope"));

    let empty = f.build_from_json(r#"{"id": "e", "processors": []}"#);
    assert!(matches!(empty, Err(ConfigurationError::EmptyPipeline(_))));

    let bad_condition = f.build_from_json(
        r#"{"processors": [{"name": "fail", "condition": {"sometimes": {}}}]}"#,
    );
    assert!(matches!(bad_condition, Err(ConfigurationError::UnknownCondition(_))));

    let bad_config = f.build_from_json(r#"{"processors": [{"name": "rename", "config": {"from": "a"}}]}"#);
    assert!(matches!(bad_config, Err(ConfigurationError::InvalidConfig { .. })));

    let mut nested = json!({"name": "fail"});
    for _ in 0..40 {
        nested = json!({"name": "fail", "onFailureProcessors": [nested]});
    }
    let deep = f.build_from_json(&json!({"processors": [nested]}).to_string());
    assert!(matches!(deep, Err(ConfigurationError::NestingTooDeep { .. })));
    println!("✓ Invalid definitions rejected before execution");
}

#[test]
fn test_yaml_definition() {
    println!("=== Testing YAML definition ===");

    let yaml = r#"
id: yaml-pipeline
name: From YAML
processors:
  - type: kv
    config:
      field: message
  - type: convert
    config:
      path: status
      type: long
    ignoreFailure: true
"#;
    let p = factory().build_from_yaml(yaml).unwrap();
    assert_eq!(p.id(), "yaml-pipeline");
    assert_eq!(p.name(), "From YAML");
    assert_eq!(p.processors().len(), 2);
    assert!(p.processors()[1].ignores_failure());

    let (exec, _) = executor();
    let mut d = doc(json!({"message": "status=404 path=/x"}));
    exec.execute(&p, &mut d).unwrap();
    assert_eq!(d.get_field("status"), Some(&json!(404)));
    assert_eq!(d.get_field("path"), Some(&json!("/x")));
    println!("✓ YAML pipeline built and executed");
}
