//! Credential store.
//!
//! Token resolution order: explicit argument, then the `MINDPACK_TOKEN`
//! environment variable, then the secret store. The store sits behind the
//! `SecretStore` trait so a native OS keychain implementation can slot in
//! at startup without touching call sites; the shipped implementation is
//! the JSON file under `~/.config/mindpack`.

use crate::services::storage;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const TOKEN_ENV: &str = "MINDPACK_TOKEN";

/// Key used when a token is not scoped to one package.
pub const DEFAULT_KEY: &str = "default";

pub trait SecretStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn clear(&self, key: &str) -> anyhow::Result<bool>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl SecretStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value.to_string());
        self.save(&map)
    }

    fn clear(&self, key: &str) -> anyhow::Result<bool> {
        let mut map = self.load()?;
        let removed = map.remove(key).is_some();
        if removed {
            self.save(&map)?;
        }
        Ok(removed)
    }
}

/// Capability check happens here, once, at startup. A native keychain
/// implementation would be probed and returned first; the file store is
/// the fallback that is always available.
pub fn open_default_store() -> anyhow::Result<Box<dyn SecretStore>> {
    let path = storage::config_dir()?.join("credentials.json");
    Ok(Box::new(FileStore::new(path)))
}

/// Resolve a token for one package: explicit > env > package-scoped store
/// entry > store default.
pub fn resolve_token(
    explicit: Option<&str>,
    store: &dyn SecretStore,
    package_id: &str,
) -> anyhow::Result<Option<String>> {
    if let Some(t) = explicit {
        return Ok(Some(t.to_string()));
    }
    if let Ok(t) = std::env::var(TOKEN_ENV) {
        if !t.is_empty() {
            return Ok(Some(t));
        }
    }
    if let Some(t) = store.get(package_id)? {
        return Ok(Some(t));
    }
    store.get(DEFAULT_KEY)
}
