//! Load model and resource definitions from a config directory.
//!
//! The directory holds `models.json` (array of [`ModelConfig`]) and an optional
//! `resources.json` (array of [`ResourceEntry`]).

use crate::config::resolved::ModelMeta;
use crate::config::types::{FullConfig, ModelConfig, ResourceEntry};
use crate::config::validator::validate;
use crate::error::ConfigError;
use crate::naming::NameMapper;
use std::path::Path;

pub async fn load_from_path(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    let models: Vec<ModelConfig> = read_json(&dir.join("models.json"), None).await?;
    let resources: Vec<ResourceEntry> = read_json(&dir.join("resources.json"), Some("[]")).await?;
    tracing::debug!(dir = %dir.display(), models = models.len(), resources = resources.len(), "config loaded");
    Ok(FullConfig { models, resources })
}

async fn read_json<T>(path: &Path, fallback: Option<&str>) -> Result<T, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && fallback.is_some() => {
            fallback.unwrap_or_default().to_string()
        }
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build model metadata from full config (validates first).
pub fn resolve_models(config: &FullConfig, mapper: &dyn NameMapper) -> Result<Vec<ModelMeta>, ConfigError> {
    validate(config, mapper)?;
    Ok(config
        .models
        .iter()
        .map(|m| ModelMeta::from_config(m, mapper))
        .collect())
}
