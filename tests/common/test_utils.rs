use gguf_infer::config::{InferenceConfig, LogsConfig, Settings};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// Settings with no stored defaults, as when no settings file is configured
pub fn create_test_settings() -> Settings {
    Settings {
        logs: LogsConfig {
            level: "debug".to_string(),
        },
        defaults: InferenceConfig::default(),
    }
}

/// Settings carrying stored inference defaults
pub fn create_test_settings_with_defaults(model_dir: &str) -> Settings {
    let mut settings = create_test_settings();
    settings.defaults = InferenceConfig {
        model_dir: Some(PathBuf::from(model_dir)),
        n_threads: Some(8),
        n_ctx: Some(2048),
        ..Default::default()
    };
    settings
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Build the raw command-line argument for a request
pub fn request_arg(model_id: &str, message: &str, config: Value) -> String {
    serde_json::json!({
        "modelId": model_id,
        "message": message,
        "config": config,
    })
    .to_string()
}

/// Sample settings YAML for testing
pub const SAMPLE_SETTINGS_YAML: &str = r#"
logs:
  level: "info"
defaults:
  model_dir: "/opt/models"
  n_threads: 8
  n_gpu_layers: -1
"#;
