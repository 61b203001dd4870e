//! Configuration file handling.
//!
//! Settings live in `~/.thron/config.toml` (override with
//! `THRON_CONFIG_FILE`). Every field has a default, so a missing file or a
//! partial file is fine.

use crate::credentials::{ApiKey, CredentialResolver, EnvSource, KeyStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub env: EnvConfig,
    pub display: DisplayConfig,
}

/// Where local state is kept.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Key store file; falls back to `FileKeyStore::default_path()`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_file: Option<PathBuf>,
}

/// Environment variables consulted when no key is stored locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvConfig {
    pub openai_var: String,
    pub financial_datasets_var: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            openai_var: ApiKey::OpenAi.default_env_var().to_string(),
            financial_datasets_var: ApiKey::FinancialDatasets.default_env_var().to_string(),
        }
    }
}

impl EnvConfig {
    pub fn var_for(&self, key: ApiKey) -> &str {
        match key {
            ApiKey::OpenAi => &self.openai_var,
            ApiKey::FinancialDatasets => &self.financial_datasets_var,
        }
    }
}

/// Initial display flags for the chat view.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub side_panel_visible: bool,
    pub readonly: bool,
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("THRON_CONFIG_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".thron/config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load from the default path, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = Self::default_path();
        match Self::load_from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from a specific path. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply the configured environment variable names to a resolver.
    pub fn configure_resolver<S: KeyStore, E: EnvSource>(
        &self,
        resolver: CredentialResolver<S, E>,
    ) -> CredentialResolver<S, E> {
        ApiKey::ALL.iter().fold(resolver, |resolver, key| {
            resolver.with_env_var(*key, self.env.var_for(*key))
        })
    }
}
