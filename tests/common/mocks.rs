use async_trait::async_trait;
use gguf_infer::{
    Error, Result,
    engine::{Completion, EngineLoader, FinishReason, GenerationParams, InferenceEngine, LoadOptions},
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct InitializeCall {
    pub model_path: PathBuf,
    pub options: LoadOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub prompt: String,
    pub params: GenerationParams,
}

/// Mock engine loader for testing; records every call it receives
#[derive(Debug)]
pub struct MockEngineLoader {
    pub completions: Vec<Completion>,
    pub initialize_error: Option<String>,
    pub generate_error: Option<String>,
    pub initialize_calls: Arc<Mutex<Vec<InitializeCall>>>,
    pub generate_calls: Arc<Mutex<Vec<GenerateCall>>>,
}

impl MockEngineLoader {
    pub fn new() -> Self {
        Self {
            completions: vec![Completion::new("Hello from the mock", FinishReason::Stop)],
            initialize_error: None,
            generate_error: None,
            initialize_calls: Arc::new(Mutex::new(Vec::new())),
            generate_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_completions(mut self, completions: Vec<Completion>) -> Self {
        self.completions = completions;
        self
    }

    pub fn with_initialize_error(mut self, error: &str) -> Self {
        self.initialize_error = Some(error.to_string());
        self
    }

    pub fn with_generate_error(mut self, error: &str) -> Self {
        self.generate_error = Some(error.to_string());
        self
    }

    pub fn get_initialize_calls(&self) -> Vec<InitializeCall> {
        self.initialize_calls.lock().unwrap().clone()
    }

    pub fn get_generate_calls(&self) -> Vec<GenerateCall> {
        self.generate_calls.lock().unwrap().clone()
    }
}

impl Default for MockEngineLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineLoader for MockEngineLoader {
    async fn initialize(
        &self,
        model_path: &Path,
        options: &LoadOptions,
    ) -> Result<Box<dyn InferenceEngine>> {
        self.initialize_calls.lock().unwrap().push(InitializeCall {
            model_path: model_path.to_path_buf(),
            options: *options,
        });

        if let Some(ref error) = self.initialize_error {
            return Err(Error::model_load(error.clone()));
        }

        Ok(Box::new(MockEngine {
            completions: self.completions.clone(),
            error: self.generate_error.clone(),
            calls: Arc::clone(&self.generate_calls),
        }))
    }
}

/// Mock engine handed out by `MockEngineLoader`
#[derive(Debug)]
pub struct MockEngine {
    pub completions: Vec<Completion>,
    pub error: Option<String>,
    pub calls: Arc<Mutex<Vec<GenerateCall>>>,
}

#[async_trait]
impl InferenceEngine for MockEngine {
    async fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<Completion>> {
        self.calls.lock().unwrap().push(GenerateCall {
            prompt: prompt.to_string(),
            params: *params,
        });

        if let Some(ref error) = self.error {
            return Err(Error::generation(error.clone()));
        }

        Ok(self.completions.clone())
    }
}
