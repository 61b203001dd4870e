//! API credential resolution.
//!
//! Keys are looked up in two tiers: a value stored on the local device
//! takes precedence, and the environment is the fallback. The execution
//! context is passed in explicitly; a server never consults local storage.
//!
//! An absent key resolves to `None`. Callers treat that as "not configured",
//! not as an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Keys and Contexts
// ============================================================================

/// Credentials the assistant knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKey {
    /// Model provider credential
    #[serde(rename = "openai")]
    OpenAi,
    /// Financial data provider credential
    FinancialDatasets,
}

impl ApiKey {
    pub const ALL: [ApiKey; 2] = [ApiKey::OpenAi, ApiKey::FinancialDatasets];

    /// Slot name in local storage.
    pub fn storage_slot(&self) -> &'static str {
        match self {
            ApiKey::OpenAi => "openaiApiKey",
            ApiKey::FinancialDatasets => "financialDatasetsApiKey",
        }
    }

    /// Default environment variable consulted as the fallback tier.
    pub fn default_env_var(&self) -> &'static str {
        match self {
            ApiKey::OpenAi => "NEXT_PUBLIC_OPENAI_API_KEY",
            ApiKey::FinancialDatasets => "NEXT_PUBLIC_FINANCIAL_DATASETS_API_KEY",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiKey::OpenAi => "openai",
            ApiKey::FinancialDatasets => "financial-datasets",
        }
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "openai" => Ok(ApiKey::OpenAi),
            "financial-datasets" | "financialdatasets" => Ok(ApiKey::FinancialDatasets),
            _ => Err(Error::UnknownKey(s.to_string())),
        }
    }
}

/// Where the resolving code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// No local device storage available
    Server,
    /// Running on the user's device
    #[default]
    Client,
}

// ============================================================================
// Storage Tiers
// ============================================================================

/// Local device storage for key values.
pub trait KeyStore {
    fn get(&self, slot: &str) -> Result<Option<String>>;
    fn set(&mut self, slot: &str, value: &str) -> Result<()>;
    fn remove(&mut self, slot: &str) -> Result<()>;
}

/// Environment configuration.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Fixed environment, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub HashMap<String, String>);

impl MapEnv {
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// In-memory key store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    values: HashMap<String, String>,
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.values.get(slot).cloned())
    }

    fn set(&mut self, slot: &str, value: &str) -> Result<()> {
        self.values.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> Result<()> {
        self.values.remove(slot);
        Ok(())
    }
}

/// Key store persisted as a JSON object of slot to value.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileKeyStore {
    /// Open the store at the default path.
    ///
    /// Default path: `~/.thron/keys.json`
    /// Can be overridden with `THRON_KEYS_FILE` environment variable.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path())
    }

    /// Open the store at a custom path. A missing file is an empty store.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("THRON_KEYS_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".thron/keys.json"))
            .unwrap_or_else(|| PathBuf::from("keys.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Write `values` to disk. The file is owner-only on unix, as is a
    /// directory created for it.
    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let content = serde_json::to_string_pretty(values)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // `mode` only applies on creation; tighten a pre-existing file too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.values.get(slot).cloned())
    }

    fn set(&mut self, slot: &str, value: &str) -> Result<()> {
        let mut values = self.values.clone();
        values.insert(slot.to_string(), value.to_string());
        self.save(&values)?;
        self.values = values;
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> Result<()> {
        if !self.values.contains_key(slot) {
            return Ok(());
        }
        let mut values = self.values.clone();
        values.remove(slot);
        self.save(&values)?;
        self.values = values;
        Ok(())
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves API keys from local storage, then the environment.
#[derive(Debug)]
pub struct CredentialResolver<S: KeyStore, E: EnvSource = ProcessEnv> {
    store: S,
    env: E,
    env_overrides: HashMap<ApiKey, String>,
}

impl<S: KeyStore> CredentialResolver<S, ProcessEnv> {
    /// Resolver backed by the process environment.
    pub fn new(store: S) -> Self {
        Self::with_env(store, ProcessEnv)
    }
}

impl<S: KeyStore, E: EnvSource> CredentialResolver<S, E> {
    pub fn with_env(store: S, env: E) -> Self {
        Self {
            store,
            env,
            env_overrides: HashMap::new(),
        }
    }

    /// Read `key` from a different environment variable.
    pub fn with_env_var(mut self, key: ApiKey, name: &str) -> Self {
        self.env_overrides.insert(key, name.to_string());
        self
    }

    /// Environment variable consulted for `key`.
    pub fn env_var(&self, key: ApiKey) -> &str {
        self.env_overrides
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| key.default_env_var())
    }

    /// Resolve `key`.
    ///
    /// On a server only the environment is consulted. On a client a
    /// non-empty stored value wins, else the environment value is used.
    /// An unreadable store is logged and treated as empty.
    pub fn resolve_key(&self, ctx: ExecutionContext, key: ApiKey) -> Option<String> {
        if ctx == ExecutionContext::Client {
            match self.store.get(key.storage_slot()) {
                Ok(Some(value)) if !value.is_empty() => {
                    tracing::debug!(%key, "resolved key from local storage");
                    return Some(value);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%key, "failed to read local key store: {}", e),
            }
        }

        let value = self.env.var(self.env_var(key)).filter(|v| !v.is_empty());
        tracing::debug!(%key, found = value.is_some(), ?ctx, "resolved key from environment");
        value
    }

    /// Locally stored value only. Always `None` on a server.
    pub fn local_key(&self, ctx: ExecutionContext, key: ApiKey) -> Result<Option<String>> {
        if ctx == ExecutionContext::Server {
            return Ok(None);
        }
        Ok(self
            .store
            .get(key.storage_slot())?
            .filter(|v| !v.is_empty()))
    }

    /// Persist `value` for `key` on the device. No-op on a server.
    pub fn store_key(&mut self, ctx: ExecutionContext, key: ApiKey, value: &str) -> Result<()> {
        if ctx == ExecutionContext::Server {
            tracing::debug!(%key, "ignoring key store on server");
            return Ok(());
        }
        self.store.set(key.storage_slot(), value)?;
        tracing::info!(%key, "stored key locally");
        Ok(())
    }

    /// Forget the stored value for `key`. No-op on a server.
    pub fn clear_key(&mut self, ctx: ExecutionContext, key: ApiKey) -> Result<()> {
        if ctx == ExecutionContext::Server {
            return Ok(());
        }
        self.store.remove(key.storage_slot())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env() -> MapEnv {
        MapEnv::default()
            .with("NEXT_PUBLIC_OPENAI_API_KEY", "sk-env")
            .with("NEXT_PUBLIC_FINANCIAL_DATASETS_API_KEY", "fd-env")
    }

    #[test]
    fn test_client_prefers_local_value() {
        let mut resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env());
        resolver
            .store_key(ExecutionContext::Client, ApiKey::OpenAi, "sk-local")
            .unwrap();

        assert_eq!(
            resolver.resolve_key(ExecutionContext::Client, ApiKey::OpenAi),
            Some("sk-local".to_string())
        );
        // Independent slots.
        assert_eq!(
            resolver.resolve_key(ExecutionContext::Client, ApiKey::FinancialDatasets),
            Some("fd-env".to_string())
        );
    }

    #[test]
    fn test_server_ignores_local_value() {
        let mut store = MemoryKeyStore::default();
        store.set("openaiApiKey", "sk-local").unwrap();
        store.set("financialDatasetsApiKey", "fd-local").unwrap();
        let resolver = CredentialResolver::with_env(store, env());

        assert_eq!(
            resolver.resolve_key(ExecutionContext::Server, ApiKey::OpenAi),
            Some("sk-env".to_string())
        );
        assert_eq!(
            resolver.resolve_key(ExecutionContext::Server, ApiKey::FinancialDatasets),
            Some("fd-env".to_string())
        );
    }

    #[test]
    fn test_store_is_noop_on_server() {
        let mut resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env());
        resolver
            .store_key(ExecutionContext::Server, ApiKey::OpenAi, "sk-local")
            .unwrap();

        assert_eq!(resolver.store().get("openaiApiKey").unwrap(), None);
    }

    #[test]
    fn test_empty_local_value_falls_back() {
        let mut resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env());
        resolver
            .store_key(ExecutionContext::Client, ApiKey::OpenAi, "")
            .unwrap();

        assert_eq!(
            resolver.resolve_key(ExecutionContext::Client, ApiKey::OpenAi),
            Some("sk-env".to_string())
        );
    }

    #[test]
    fn test_unconfigured_key_is_none() {
        let resolver =
            CredentialResolver::with_env(MemoryKeyStore::default(), MapEnv::default());
        assert_eq!(resolver.resolve_key(ExecutionContext::Client, ApiKey::OpenAi), None);
        assert_eq!(resolver.resolve_key(ExecutionContext::Server, ApiKey::OpenAi), None);
    }

    #[test]
    fn test_local_key() {
        let mut resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env());
        assert_eq!(
            resolver.local_key(ExecutionContext::Client, ApiKey::OpenAi).unwrap(),
            None
        );

        resolver
            .store_key(ExecutionContext::Client, ApiKey::OpenAi, "sk-local")
            .unwrap();
        assert_eq!(
            resolver.local_key(ExecutionContext::Client, ApiKey::OpenAi).unwrap(),
            Some("sk-local".to_string())
        );
        assert_eq!(
            resolver.local_key(ExecutionContext::Server, ApiKey::OpenAi).unwrap(),
            None
        );
    }

    #[test]
    fn test_clear_key() {
        let mut resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env());
        resolver
            .store_key(ExecutionContext::Client, ApiKey::OpenAi, "sk-local")
            .unwrap();
        resolver.clear_key(ExecutionContext::Client, ApiKey::OpenAi).unwrap();

        assert_eq!(
            resolver.resolve_key(ExecutionContext::Client, ApiKey::OpenAi),
            Some("sk-env".to_string())
        );
    }

    #[test]
    fn test_env_var_override() {
        let env = MapEnv::default().with("THRON_OPENAI_KEY", "sk-custom");
        let resolver = CredentialResolver::with_env(MemoryKeyStore::default(), env)
            .with_env_var(ApiKey::OpenAi, "THRON_OPENAI_KEY");

        assert_eq!(resolver.env_var(ApiKey::OpenAi), "THRON_OPENAI_KEY");
        assert_eq!(
            resolver.env_var(ApiKey::FinancialDatasets),
            "NEXT_PUBLIC_FINANCIAL_DATASETS_API_KEY"
        );
        assert_eq!(
            resolver.resolve_key(ExecutionContext::Server, ApiKey::OpenAi),
            Some("sk-custom".to_string())
        );
    }

    #[test]
    fn test_parse_key_names() {
        assert_eq!("openai".parse::<ApiKey>().unwrap(), ApiKey::OpenAi);
        assert_eq!(
            "financial_datasets".parse::<ApiKey>().unwrap(),
            ApiKey::FinancialDatasets
        );
        assert!(matches!("anthropic".parse::<ApiKey>(), Err(Error::UnknownKey(_))));
        assert_eq!(ApiKey::FinancialDatasets.to_string(), "financial-datasets");
        assert_eq!(serde_json::to_value(ApiKey::OpenAi).unwrap(), "openai");
    }

    #[test]
    fn test_file_store_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/keys.json");

        {
            let store = FileKeyStore::with_path(path.clone()).unwrap();
            let mut resolver = CredentialResolver::with_env(store, MapEnv::default());
            resolver
                .store_key(ExecutionContext::Client, ApiKey::FinancialDatasets, "fd-local")
                .unwrap();
        }

        {
            let store = FileKeyStore::with_path(path.clone()).unwrap();
            let resolver = CredentialResolver::with_env(store, MapEnv::default());
            assert_eq!(
                resolver.resolve_key(ExecutionContext::Client, ApiKey::FinancialDatasets),
                Some("fd-local".to_string())
            );
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("financialDatasetsApiKey"));
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let mut store = FileKeyStore::with_path(path.clone()).unwrap();
        store.set("openaiApiKey", "sk").unwrap();
        store.remove("openaiApiKey").unwrap();

        let reopened = FileKeyStore::with_path(path).unwrap();
        assert_eq!(reopened.get("openaiApiKey").unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(FileKeyStore::with_path(path), Err(Error::Json(_))));
    }

    #[test]
    fn test_file_store_failed_write_keeps_old_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let mut store = FileKeyStore::with_path(path.clone()).unwrap();
        store.set("openaiApiKey", "sk-saved").unwrap();

        // A directory in place of the file makes every write fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(
            store.set("openaiApiKey", "sk-unsaved"),
            Err(Error::Io(_))
        ));
        assert!(store.set("financialDatasetsApiKey", "fd-unsaved").is_err());
        assert!(store.remove("openaiApiKey").is_err());

        assert_eq!(store.get("openaiApiKey").unwrap(), Some("sk-saved".to_string()));
        assert_eq!(store.get("financialDatasetsApiKey").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("thron/keys.json");

        let mut store = FileKeyStore::with_path(path.clone()).unwrap();
        store.set("openaiApiKey", "sk-secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "key file should be owner-only");
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700, "created key directory should be owner-only");

        // A file left readable by an older version is tightened on the next write.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        store.set("financialDatasetsApiKey", "fd-secret").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
