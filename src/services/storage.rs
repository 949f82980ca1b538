//! Local paths, configuration and the audit log.
//!
//! Everything user-scoped lives under `$HOME/.config/mindpack` (config,
//! credentials, audit trail) and `$HOME/.local/share/mindpack` (the
//! package cache database). The knowledge tree itself is per-project and
//! passed in via `--root`.

use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CATALOG: &str = "https://catalog.mindpack.dev";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_catalog")]
    pub catalog: String,
    /// Minimum file count for a publishable package.
    #[serde(default = "default_min_files")]
    pub min_package_files: usize,
}

fn default_catalog() -> String {
    DEFAULT_CATALOG.to_string()
}

fn default_min_files() -> usize {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            min_package_files: default_min_files(),
        }
    }
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".config/mindpack"))
}

pub fn data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".local/share/mindpack"))
}

pub fn cache_db_path() -> anyhow::Result<PathBuf> {
    Ok(data_dir()?.join("cache.db"))
}

pub fn load_config() -> anyhow::Result<Config> {
    let path = config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

/// Append an event to the local audit log. Best-effort: auditing never
/// fails the operation being audited.
pub fn audit(action: &str, data: serde_json::Value) {
    let Ok(dir) = config_dir() else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);
    let event = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "action": action,
        "data": data,
    });
    let line = format!("{}\n", event);
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("audit.jsonl"))
        .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()));
}

/// A relative path is safe when it cannot escape the package root: no
/// absolute form, no `..` segments, no empty components.
pub fn safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    if path.contains(':') {
        return false;
    }
    path.split(['/', '\\'])
        .all(|seg| !seg.is_empty() && seg != "..")
}
