mod types;

pub use types::*;

use crate::Result;
use std::env;
use std::path::Path;
use tracing::debug;

/// Environment variable naming the optional YAML settings file.
pub const CONFIG_PATH_ENV: &str = "GGUF_INFER_CONFIG";

/// Load settings from `GGUF_INFER_CONFIG`, or built-in defaults when unset.
pub async fn load() -> Result<Settings> {
    match env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => load_from(&path).await,
        _ => Ok(Settings::default()),
    }
}

pub async fn load_from(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    debug!("Loading settings from: {}", path.display());

    let settings_str = tokio::fs::read_to_string(path).await?;
    let settings: Settings = serde_yaml::from_str(&settings_str)?;

    Ok(settings)
}
