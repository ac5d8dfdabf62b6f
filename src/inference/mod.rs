use crate::config::{InferenceConfig, Settings};
use crate::engine::{EngineLoader, GenerationParams};
use crate::request::{InferenceOutcome, Request};
use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

pub const MODEL_EXTENSION: &str = "gguf";

/// `<model_dir>/<model_id>.gguf`. The id must name a file directly inside
/// `model_dir`.
pub fn model_path(model_dir: &Path, model_id: &str) -> Result<PathBuf> {
    let file_name = format!("{model_id}.{MODEL_EXTENSION}");
    let mut components = Path::new(&file_name).components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == file_name.as_str() => {
            Ok(model_dir.join(name))
        }
        _ => Err(Error::request(format!(
            "invalid modelId '{model_id}': must be a file name without path separators"
        ))),
    }
}

/// Decode the raw argument and run it. Every failure ends up in the outcome.
pub async fn handle(
    arg: Option<&str>,
    settings: &Settings,
    loader: &dyn EngineLoader,
) -> InferenceOutcome {
    match Request::from_arg(arg) {
        Ok(mut request) => {
            request.config = request.config.merged_over(&settings.defaults);
            run_inference(loader, &request).await
        }
        Err(e) => {
            error!("Failed to decode request: {}", e);
            InferenceOutcome::error(e)
        }
    }
}

pub async fn run_inference(loader: &dyn EngineLoader, request: &Request) -> InferenceOutcome {
    match infer(loader, &request.model_id, &request.message, &request.config).await {
        Ok(text) => InferenceOutcome::response(text),
        Err(e) => {
            error!("Inference failed for model {}: {}", request.model_id, e);
            InferenceOutcome::error(e)
        }
    }
}

/// Load the model, complete `message` once and return the trimmed text.
pub async fn infer(
    loader: &dyn EngineLoader,
    model_id: &str,
    message: &str,
    config: &InferenceConfig,
) -> Result<String> {
    let path = model_path(config.model_dir()?, model_id)?;
    let options = config.load_options()?;

    info!(model = %path.display(), ?options, "Initializing engine");
    let mut engine = loader.initialize(&path, &options).await?;

    let params = GenerationParams::default();
    let completions = engine.generate(message, &params).await?;

    let completion = completions
        .into_iter()
        .next()
        .ok_or_else(|| Error::generation("engine returned no completions"))?;

    info!(finish_reason = ?completion.finish_reason, "Response generated");
    Ok(completion.text.trim().to_string())
}
