use super::types::*;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// Loads a model file and hands back a ready engine.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn initialize(
        &self,
        model_path: &Path,
        options: &LoadOptions,
    ) -> Result<Box<dyn InferenceEngine>>;
}

/// A loaded model able to complete prompts.
#[async_trait]
pub trait InferenceEngine: Send {
    async fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<Completion>>;
}
