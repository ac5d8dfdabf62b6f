use anyhow::Result;
use gguf_infer::{
    config::{self, LogsConfig},
    engine::CandleLoader,
    inference,
    request::InferenceOutcome,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries only the result line.
fn init_tracing(configured_level: &str) {
    // Environment variable overrides the settings file
    let log_level =
        std::env::var("RUST_LOG").unwrap_or_else(|_| configured_level.to_string());
    let fallback = LogsConfig::default().level;

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|e| {
        eprintln!(
            "Invalid log level: '{}' ({}). Falling back to '{}'",
            log_level, e, fallback
        );
        EnvFilter::new(&fallback)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load settings first (before logging setup)
    let settings = config::load().await;
    let log_level = match &settings {
        Ok(settings) => settings.logs.level.clone(),
        Err(_) => LogsConfig::default().level,
    };
    init_tracing(&log_level);

    let arg = std::env::args().nth(1);

    let outcome = match settings {
        Ok(settings) => {
            debug!("Settings loaded");
            inference::handle(arg.as_deref(), &settings, &CandleLoader::new()).await
        }
        Err(e) => InferenceOutcome::error(format!("Failed to load settings: {}", e)),
    };

    if !outcome.is_error() {
        info!("Inference completed");
    }
    println!("{}", outcome.to_json_line());

    Ok(())
}
