use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::process::{Command, Output};

mod common;
use common::{create_temp_dir, request_arg};

fn run_cli(args: &[&str], settings_path: Option<&str>) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gguf-infer"));
    command.args(args).env_remove("RUST_LOG");
    match settings_path {
        Some(path) => command.env("GGUF_INFER_CONFIG", path),
        None => command.env_remove("GGUF_INFER_CONFIG"),
    };
    command.output().expect("Failed to run gguf-infer")
}

/// The single JSON line printed on stdout
fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "expected exactly one line, got {stdout:?}");
    serde_json::from_str(lines[0]).unwrap()
}

fn error_message(value: &Value) -> String {
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 1);
    object["error"].as_str().unwrap().to_string()
}

#[test]
fn test_missing_argument_prints_error() {
    let output = run_cli(&[], None);

    assert!(output.status.success());
    let error = error_message(&stdout_json(&output));
    assert!(error.contains("missing request argument"));
}

#[test]
fn test_malformed_argument_prints_error() {
    let output = run_cli(&["not json at all"], None);

    assert!(output.status.success());
    error_message(&stdout_json(&output));
}

#[test]
fn test_missing_model_file_prints_error() {
    let dir = create_temp_dir();
    let model_dir = dir.path().to_string_lossy().to_string();
    let arg = request_arg("missing", "Hi", json!({ "model_dir": model_dir }));

    let output = run_cli(&[&arg], None);

    assert!(output.status.success());
    let error = error_message(&stdout_json(&output));
    assert!(error.contains("failed to open model file"));
    assert!(error.contains("missing.gguf"));
}

#[test]
fn test_corrupt_model_file_prints_error() {
    let dir = create_temp_dir();
    std::fs::write(dir.path().join("broken.gguf"), b"not a model").unwrap();
    let model_dir = dir.path().to_string_lossy().to_string();
    let arg = request_arg("broken", "Hi", json!({ "model_dir": model_dir }));

    let output = run_cli(&[&arg], None);

    let error = error_message(&stdout_json(&output));
    assert!(error.starts_with("Model load error:"));
}

#[test]
fn test_missing_model_dir_prints_error() {
    let arg = request_arg("tinyllama", "Hi", json!({}));

    let output = run_cli(&[&arg], None);

    let error = error_message(&stdout_json(&output));
    assert!(error.contains("model_dir"));
}

#[test]
fn test_unreadable_settings_prints_error() {
    let dir = create_temp_dir();
    let settings_path = dir.path().join("absent.yaml");
    let arg = request_arg("tinyllama", "Hi", json!({ "model_dir": "/models" }));

    let output = run_cli(&[&arg], Some(&settings_path.to_string_lossy()));

    assert!(output.status.success());
    let error = error_message(&stdout_json(&output));
    assert!(error.starts_with("Failed to load settings"));
}

#[test]
fn test_settings_defaults_supply_model_dir() {
    let dir = create_temp_dir();
    let settings_path = dir.path().join("settings.yaml");
    std::fs::write(
        &settings_path,
        format!("defaults:\n  model_dir: \"{}\"\n", dir.path().display()),
    )
    .unwrap();
    let arg = request_arg("absent-model", "Hi", json!({}));

    let output = run_cli(&[&arg], Some(&settings_path.to_string_lossy()));

    let error = error_message(&stdout_json(&output));
    assert!(error.contains("absent-model.gguf"));
}
