// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading (spec §6). One main document plus one file per
//! adapter, both TOML, validated once at startup. Mutable config
//! dictionaries in the original are replaced with these immutable,
//! validated structures (spec §9).

use std::collections::HashMap;
use std::path::Path;

use archive_core::AdapterConfig;
use archive_types::{ArchiveError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub metadata: MetadataConfig,
    pub adapters: Vec<AdapterRef>,
    pub options: Options,
    pub canonical_adapter: String,
    pub canonical_adapter_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub db_file: String,
    /// Advisory; the only manager this crate implements is `"sqlite"`.
    #[serde(default = "default_manager_type")]
    pub manager_type: String,
}

fn default_manager_type() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterRef {
    pub id: String,
    #[serde(rename = "type")]
    pub adapter_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    pub dropbox_dir: String,
    pub output_dir: String,
    pub config_dir: String,
}

impl MainConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::ConfigurationError(format!("reading main config {path:?}: {e}"))
        })?;
        let config: MainConfig = toml::from_str(&raw)
            .map_err(|e| ArchiveError::ConfigurationError(format!("parsing {path:?}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.adapters.is_empty() {
            return Err(ArchiveError::ConfigurationError(
                "at least one adapter must be configured".to_string(),
            ));
        }
        if !self.adapters.iter().any(|a| a.id == self.canonical_adapter) {
            return Err(ArchiveError::ConfigurationError(format!(
                "canonical_adapter `{}` is not among configured adapters",
                self.canonical_adapter
            )));
        }
        Ok(())
    }

    /// Reads `<config_dir>/<id>_config.toml` for each configured
    /// adapter and hands back the `(adapter_type, params)` map
    /// `archive-core`'s `AdapterManager` needs to construct them.
    pub fn adapter_configs(&self) -> Result<HashMap<String, AdapterConfig>> {
        let mut configs = HashMap::new();
        for adapter_ref in &self.adapters {
            let path = Path::new(&self.options.config_dir).join(format!("{}_config.toml", adapter_ref.id));
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ArchiveError::ConfigurationError(format!("reading adapter config {path:?}: {e}"))
            })?;
            let toml_value: toml::Value = toml::from_str(&raw)
                .map_err(|e| ArchiveError::ConfigurationError(format!("parsing {path:?}: {e}")))?;
            let params = serde_json::to_value(toml_value)
                .map_err(|e| ArchiveError::ConfigurationError(e.to_string()))?;
            configs.insert(adapter_ref.id.clone(), (adapter_ref.adapter_type.clone(), params));
        }
        Ok(configs)
    }
}
