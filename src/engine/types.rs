use serde::{Deserialize, Serialize};

pub const DEFAULT_N_GPU_LAYERS: i32 = 0;
pub const DEFAULT_N_THREADS: usize = 4;
pub const DEFAULT_N_CTX: usize = 4096;
pub const DEFAULT_N_BATCH: usize = 512;

pub const MAX_TOKENS: usize = 512;
pub const TEMPERATURE: f64 = 0.7;
pub const TOP_P: f64 = 0.9;

/// Options applied when a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Layers to offload to the GPU; negative offloads all of them.
    pub n_gpu_layers: i32,
    /// Worker threads used for tensor work.
    pub n_threads: usize,
    /// Context window, prompt plus generated tokens.
    pub n_ctx: usize,
    /// Maximum prompt tokens evaluated in a single forward pass.
    pub n_batch: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            n_gpu_layers: DEFAULT_N_GPU_LAYERS,
            n_threads: DEFAULT_N_THREADS,
            n_ctx: DEFAULT_N_CTX,
            n_batch: DEFAULT_N_BATCH,
        }
    }
}

impl LoadOptions {
    pub fn offloads_gpu(&self) -> bool {
        self.n_gpu_layers != 0
    }
}

/// Sampling policy for one generation call.
///
/// Callers never configure this; `Default` is the policy every request uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// End-of-sequence token sampled.
    Stop,
    /// Token budget exhausted.
    Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

impl Completion {
    pub fn new(text: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            text: text.into(),
            finish_reason,
        }
    }
}
