// tests/cli_tests.rs
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn pipeline_file(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

const TAGGING_PIPELINE: &str = r#"
id: cli
processors:
  - name: addField
    config:
      path: seen
      value: true
  - name: drop
    condition:
      hasValue:
        field: level
        possibleValues: [debug]
"#;

#[test]
fn test_jsonl_roundtrip() {
    println!("=== Testing JSONL through the CLI ===");
    let pipeline = pipeline_file(TAGGING_PIPELINE);

    let mut cmd = Command::cargo_bin("sawlog").unwrap();
    cmd.arg("--pipeline")
        .arg(pipeline.path())
        .write_stdin("{\"level\":\"info\",\"msg\":\"a\"}\n{\"level\":\"debug\",\"msg\":\"b\"}\n\n")
        .assert()
        .success()
        .stdout("{\"level\":\"info\",\"msg\":\"a\",\"seen\":true}\n");
    println!("✓ Debug line dropped, info line tagged");
}

#[test]
fn test_plain_input_with_grok() {
    println!("=== Testing plain input + grok ===");
    let pipeline = pipeline_file(
        r#"
processors:
  - name: grok
    config:
      field: message
      patterns: ["%{WORD:method} %{URIPATH:path}"]
  - name: removeField
    config:
      fields: message
"#,
    );

    let mut cmd = Command::cargo_bin("sawlog").unwrap();
    cmd.arg("-p")
        .arg(pipeline.path())
        .arg("--format")
        .arg("plain")
        .write_stdin("GET /index.html\n")
        .assert()
        .success()
        .stdout("{\"method\":\"GET\",\"path\":\"/index.html\"}\n");
    println!("✓ Plain line parsed by grok");
}

#[test]
fn test_failures_are_skipped_and_counted() {
    println!("=== Testing failing documents ===");
    let pipeline = pipeline_file(
        r#"
processors:
  - name: convert
    config:
      path: n
      type: long
"#,
    );

    let mut cmd = Command::cargo_bin("sawlog").unwrap();
    cmd.arg("-p")
        .arg(pipeline.path())
        .arg("--stats")
        .write_stdin("{\"n\":\"x\"}\nnot json\n{\"n\":\"7\"}\n")
        .assert()
        .success()
        .stdout("{\"n\":7}\n")
        .stderr(predicate::str::contains("\"failed\": 1"))
        .stderr(predicate::str::contains("\"succeeded\": 1"));
    println!("✓ Bad documents skipped, good ones written");
}

#[test]
fn test_invalid_pipeline_exits_before_reading_input() {
    println!("=== Testing configuration errors ===");
    let pipeline = pipeline_file(
        r#"
processors:
  - name: doesNotExist
"#,
    );

    let mut cmd = Command::cargo_bin("sawlog").unwrap();
    cmd.arg("-p")
        .arg(pipeline.path())
        .write_stdin("{\"a\":1}\n")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("doesNotExist"));
    println!("✓ Unknown processor rejected with exit code 1");
}

#[test]
fn test_custom_pattern_file_and_output_file() {
    println!("=== Testing --patterns and --output ===");
    let mut patterns = NamedTempFile::new().unwrap();
    writeln!(patterns, "# custom patterns").unwrap();
    writeln!(patterns, "TICKET [A-Z]+-[0-9]+").unwrap();
    let pipeline = pipeline_file(
        r#"
processors:
  - name: grok
    config:
      field: message
      patterns: ["%{TICKET:ticket}"]
"#,
    );
    let output = NamedTempFile::new().unwrap();

    let mut cmd = Command::cargo_bin("sawlog").unwrap();
    cmd.arg("-p")
        .arg(pipeline.path())
        .arg("--patterns")
        .arg(patterns.path())
        .arg("-f")
        .arg("plain")
        .arg("-o")
        .arg(output.path())
        .write_stdin("fixes OPS-42 today\n")
        .assert()
        .success();

    let written = std::fs::read_to_string(output.path()).unwrap();
    assert_eq!(written, "{\"message\":\"fixes OPS-42 today\",\"ticket\":\"OPS-42\"}\n");
    println!("✓ Custom pattern loaded, output written to file");
}
