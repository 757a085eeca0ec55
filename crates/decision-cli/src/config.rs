use std::path::Path;

use anyhow::{Context, Result};
use decision_engine::EngineConfig;
use tracing::info;

/// Engine config from `path`, or env defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!(path = %path.display(), "Loaded engine config");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}
