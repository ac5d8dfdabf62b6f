use super::client::{EngineLoader, InferenceEngine};
use super::model::LoadedModel;
use super::types::*;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Loads GGUF llama models with candle.
#[derive(Debug, Clone, Default)]
pub struct CandleLoader;

impl CandleLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineLoader for CandleLoader {
    async fn initialize(
        &self,
        model_path: &Path,
        options: &LoadOptions,
    ) -> Result<Box<dyn InferenceEngine>> {
        let model_path = model_path.to_path_buf();
        let options = *options;

        let model =
            tokio::task::spawn_blocking(move || LoadedModel::load(&model_path, &options))
                .await??;

        Ok(Box::new(CandleEngine {
            model: Arc::new(Mutex::new(model)),
        }))
    }
}

pub struct CandleEngine {
    model: Arc<Mutex<LoadedModel>>,
}

#[async_trait]
impl InferenceEngine for CandleEngine {
    async fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<Completion>> {
        let model = Arc::clone(&self.model);
        let prompt = prompt.to_string();
        let params = *params;

        let completion = tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model.generate(&prompt, &params)
        })
        .await??;

        Ok(vec![completion])
    }
}
