// tests/concurrency_tests.rs
use sawlog::{
    ConditionParser, ConfigurationError, Document, ExecutionOutcome, ExecutionWatchdog,
    GrokCompiler, InMemoryMetricsTracker, MetricsTracker, PipelineExecutor, PipelineFactory,
    ProcessResult, Processor, ProcessorRegistry, WatchdogConfig,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct SleepProcessor(Duration);

impl Processor for SleepProcessor {
    fn process(&self, _doc: &mut Document) -> ProcessResult {
        thread::sleep(self.0);
        ProcessResult::Ok
    }

    fn name(&self) -> &str {
        "sleep"
    }
}

fn registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::with_builtins(GrokCompiler::with_default_patterns());
    registry.register(
        "sleep",
        |config: &Map<String, Value>| -> Result<Box<dyn Processor>, ConfigurationError> {
            let ms = config.get("ms").and_then(Value::as_u64).unwrap_or(0);
            Ok(Box::new(SleepProcessor(Duration::from_millis(ms))))
        },
    );
    registry
}

#[test]
fn test_shared_pipeline_across_threads() {
    println!("=== Testing concurrent executions ===");

    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let factory = PipelineFactory::new(Arc::new(registry()), ConditionParser::default());
    let pipeline = factory
        .build_from_json(
            &json!({
                "id": "shared",
                "processors": [
                    {"name": "grok", "config": {"field": "message", "patterns": ["%{WORD:verb} %{INT:n:long}"]}},
                    {"name": "drop", "condition": {"mathComparator": {"field": "n", "lt": 0}}},
                    {"name": "addTag", "config": {"tags": ["seen"]}}
                ]
            })
            .to_string(),
        )
        .unwrap();

    let metrics = Arc::new(InMemoryMetricsTracker::new());
    let executor = PipelineExecutor::new(metrics.clone());

    thread::scope(|scope| {
        for t in 0..THREADS {
            let (pipeline, executor) = (&pipeline, &executor);
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let n = if i % 10 == 0 { -1 } else { (t * PER_THREAD + i) as i64 };
                    let mut doc = Document::from_value(json!({"message": format!("GET {}", n)})).unwrap();
                    let outcome = executor.execute(pipeline, &mut doc).unwrap();
                    if n < 0 {
                        assert_eq!(outcome, ExecutionOutcome::Dropped);
                    } else {
                        assert_eq!(doc.get_field("n"), Some(&json!(n)));
                        assert_eq!(doc.get_field("tags"), Some(&json!(["seen"])));
                    }
                }
            });
        }
    });

    let total = (THREADS * PER_THREAD) as u64;
    assert_eq!(metrics.total_processed(), total);
    assert_eq!(metrics.total_dropped(), total / 10);
    assert_eq!(metrics.total_succeeded(), total - total / 10);
    assert_eq!(metrics.processor_stats("grok").unwrap().count, total);
    println!("✓ {} documents processed by {} threads", total, THREADS);
}

#[test]
fn test_watchdog_reports_slow_execution() {
    println!("=== Testing watchdog with executor ===");

    let factory = PipelineFactory::new(Arc::new(registry()), ConditionParser::default());
    let slow = factory
        .build_from_json(r#"{"id": "slow", "processors": [{"name": "sleep", "config": {"ms": 400}}]}"#)
        .unwrap();
    let fast = factory
        .build_from_json(r#"{"id": "fast", "processors": [{"name": "sleep", "config": {"ms": 0}}]}"#)
        .unwrap();

    let metrics = Arc::new(InMemoryMetricsTracker::new());
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    let config = WatchdogConfig::new(Duration::from_millis(20), 3).unwrap();
    let watchdog = Arc::new(
        ExecutionWatchdog::new(config, metrics.clone(), move |context| {
            assert_eq!(context.pipeline_id, "slow");
            assert_eq!(context.document.get("request"), Some(&json!("stuck-42")));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap(),
    );
    watchdog.start().unwrap();
    let executor = PipelineExecutor::new(metrics.clone()).with_watchdog(Arc::clone(&watchdog));

    let mut doc = Document::from_value(json!({"a": 1})).unwrap();
    executor.execute(&fast, &mut doc).unwrap();
    let mut doc = Document::from_value(json!({"request": "stuck-42"})).unwrap();
    assert_eq!(executor.execute(&slow, &mut doc).unwrap(), ExecutionOutcome::Succeeded);

    // Let a full cycle pass so nothing is left in flight
    thread::sleep(Duration::from_millis(100));
    watchdog.shutdown();

    assert_eq!(reported.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.total_overtime(), 1);
    assert_eq!(watchdog.in_flight(), 0);
    println!("✓ Slow execution reported exactly once, with its document");
}
