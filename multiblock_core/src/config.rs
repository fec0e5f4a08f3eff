//! Registry tuning, loaded from `registry_config.json`.
//!
//! `MULTIBLOCK_CONFIG_PATH` overrides the bundled file.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::world::DimensionId;

pub const BUILTIN_REGISTRY_CONFIG: &str = include_str!("data/registry_config.json");
pub const CONFIG_PATH_ENV: &str = "MULTIBLOCK_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub scan_interval_ms: u64,
    pub scanner_thread_name: String,
    pub record_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 250,
            scanner_thread_name: "multiblock-scanner".to_string(),
            record_prefix: "Multiblocked".to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_REGISTRY_CONFIG)
                .expect("builtin registry config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| RegistryConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = RegistryConfig::from_json_str(&contents)?;
        if config.scan_interval_ms == 0 {
            return Err(RegistryConfigError::ZeroInterval);
        }
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    /// Name of the saved record holding `dimension`'s structures.
    pub fn record_name(&self, dimension: &DimensionId) -> String {
        format!("{}{}", self.record_prefix, dimension.suffix())
    }
}

#[derive(Debug, Error)]
pub enum RegistryConfigError {
    #[error("failed to parse registry config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read registry config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scan_interval_ms must be greater than zero")]
    ZeroInterval,
}

/// Load the registry configuration from the environment override, if any,
/// falling back to the bundled defaults.
pub fn load_registry_config_from_env() -> Arc<RegistryConfig> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
        match RegistryConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "multiblocked::config",
                    path = %path.display(),
                    "registry_config.loaded=file"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "multiblocked::config",
                    path = %path.display(),
                    error = %err,
                    "registry_config.load_failed"
                );
            }
        }
    }

    tracing::debug!(target: "multiblocked::config", "registry_config.loaded=builtin");
    RegistryConfig::builtin()
}
