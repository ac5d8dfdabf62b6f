use crate::engine::LoadOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file contents. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logs: LogsConfig,
    /// Stored inference defaults; request `config` keys override them.
    #[serde(default)]
    pub defaults: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Model-loading options as supplied by a caller.
///
/// Unknown keys are ignored: callers usually forward a whole settings object
/// that also carries sampling keys this program does not read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Layers to offload to the GPU. Negative means all of them.
    #[serde(default)]
    pub n_gpu_layers: Option<i32>,
    #[serde(default)]
    pub n_threads: Option<usize>,
    #[serde(default)]
    pub n_ctx: Option<usize>,
    #[serde(default)]
    pub n_batch: Option<usize>,
}

impl InferenceConfig {
    /// Fill every unset key from `defaults`.
    pub fn merged_over(self, defaults: &InferenceConfig) -> InferenceConfig {
        InferenceConfig {
            model_dir: self.model_dir.or_else(|| defaults.model_dir.clone()),
            n_gpu_layers: self.n_gpu_layers.or(defaults.n_gpu_layers),
            n_threads: self.n_threads.or(defaults.n_threads),
            n_ctx: self.n_ctx.or(defaults.n_ctx),
            n_batch: self.n_batch.or(defaults.n_batch),
        }
    }

    pub fn model_dir(&self) -> Result<&Path> {
        match self.model_dir.as_deref() {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
            _ => Err(Error::config("missing required option 'model_dir'")),
        }
    }

    pub fn load_options(&self) -> Result<LoadOptions> {
        let defaults = LoadOptions::default();
        let options = LoadOptions {
            n_gpu_layers: self.n_gpu_layers.unwrap_or(defaults.n_gpu_layers),
            n_threads: self.n_threads.unwrap_or(defaults.n_threads),
            n_ctx: self.n_ctx.unwrap_or(defaults.n_ctx),
            n_batch: self.n_batch.unwrap_or(defaults.n_batch),
        };

        for (name, value) in [
            ("n_threads", options.n_threads),
            ("n_ctx", options.n_ctx),
            ("n_batch", options.n_batch),
        ] {
            if value == 0 {
                return Err(Error::config(format!("'{name}' must be at least 1")));
            }
        }

        Ok(options)
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
