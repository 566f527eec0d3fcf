use std::path::Path;

use anyhow::Context;
use hashfetch::{HashFetchOptions, StaticRegistry};

use crate::app::App;

/// Engine options: file values first, then command-line overrides.
pub fn load_options(app: &App) -> anyhow::Result<HashFetchOptions> {
    let mut options = match &app.config {
        Some(path) => parse_options(&read(path)?).with_context(|| format!("invalid config {}", path.display()))?,
        None => HashFetchOptions::default(),
    };
    if let Some(root) = &app.root {
        options = options.root(root);
    }
    Ok(options)
}

pub fn load_registry(app: &App) -> anyhow::Result<StaticRegistry> {
    let Some(path) = &app.registry else {
        tracing::warn!("no registry given, every unknown hash will fail to resolve");
        return Ok(StaticRegistry::new());
    };
    let registry = StaticRegistry::from_json(&read(path)?)
        .with_context(|| format!("invalid registry {}", path.display()))?;
    tracing::debug!(entries = registry.len(), path = %path.display(), "registry loaded");
    Ok(registry)
}

fn parse_options(text: &str) -> anyhow::Result<HashFetchOptions> { Ok(toml::from_str(text)?) }

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
