//! Trigger router.
//!
//! Walks the knowledge tree, extracts per-file trigger keywords, scores
//! queries against them and renders the routing manifest the AI runtime
//! reads to decide which files to load.
//!
//! Matching is a cheap bidirectional substring test: trigger keywords are
//! short creator-authored phrases, so "logo" matching "logo design" (and
//! vice versa) covers pluralization and compound phrases without a
//! stemmer, and stays fully deterministic across repeated calls.

use crate::domain::models::InstalledPackage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const ROUTING_FILE: &str = "ROUTING.md";

const MANIFEST_PREAMBLE: &str = "\
# Knowledge Routing Manifest

<!-- generated by mindpack; regenerated wholesale, never hand-edited -->

Match the task against each file's triggers and load only the files whose
triggers apply. Structured-log files carry a schema line instead of
triggers; load them when the task concerns that schema.
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    #[serde(rename = "markdown")]
    Markdown,
    #[serde(rename = "structured-log")]
    StructuredLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// Path relative to the knowledge-tree root, `/`-separated.
    pub path: String,
    pub kind: FileKind,
    pub triggers: Vec<String>,
    /// Schema name + description of a structured-log file.
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub score: usize,
    pub triggers: Vec<String>,
}

/// Extract the comma-separated trigger list from a leading `Load for:`
/// metadata line. Only the head of the file is considered metadata.
pub fn extract_triggers(content: &str) -> Vec<String> {
    for line in content.lines().take(12) {
        let trimmed = line.trim_start_matches(['#', '>', '-', '*', ' ']).trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("load for:") {
            let offset = trimmed.len() - rest.len();
            return trimmed[offset..]
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
    }
    Vec::new()
}

/// The first line of a structured log is schema metadata, never data.
fn extract_schema(content: &str) -> Option<String> {
    let first = content.lines().next()?;
    let value: serde_json::Value = serde_json::from_str(first).ok()?;
    let name = value
        .get("schema")
        .or_else(|| value.get("name"))
        .and_then(|v| v.as_str())?;
    match value.get("description").and_then(|v| v.as_str()) {
        Some(desc) => Some(format!("{}: {}", name, desc)),
        None => Some(name.to_string()),
    }
}

/// Walk the tree and build the file inventory, sorted by path. Unreadable
/// files are logged and skipped; one corrupt file never blocks routing
/// for the rest of the tree.
pub fn build_file_inventory(root: &Path) -> Vec<FileInfo> {
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<FileInfo>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("skipping unreadable directory {}: {}", dir.display(), e);
            return;
        }
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') || name == ROUTING_FILE {
            continue;
        }
        if path.is_dir() {
            walk(root, &path, out);
            continue;
        }
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") | Some("txt") => FileKind::Markdown,
            Some("jsonl") | Some("ndjson") => FileKind::StructuredLog,
            _ => continue,
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping unreadable file {}: {}", path.display(), e);
                continue;
            }
        };
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match kind {
            FileKind::Markdown => out.push(FileInfo {
                path: rel,
                kind,
                triggers: extract_triggers(&content),
                schema: None,
            }),
            FileKind::StructuredLog => out.push(FileInfo {
                path: rel,
                kind,
                triggers: Vec::new(),
                schema: extract_schema(&content),
            }),
        }
    }
}

/// Rank inventory files against a query. Score counts (token, trigger)
/// pairs where either string contains the other; zero-score files are
/// excluded; ties keep inventory order (stable sort).
pub fn search(query: &str, inventory: &[FileInfo]) -> Vec<SearchHit> {
    let tokens: Vec<String> = query
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<SearchHit> = inventory
        .iter()
        .filter_map(|file| {
            let mut score = 0usize;
            for trigger in &file.triggers {
                let trigger = trigger.to_ascii_lowercase();
                for token in &tokens {
                    // Each containment direction scores, so an exact match
                    // counts double: "logo" against "logo, brand" scores 2.
                    if token.contains(trigger.as_str()) {
                        score += 1;
                    }
                    if trigger.contains(token.as_str()) {
                        score += 1;
                    }
                }
            }
            (score > 0).then(|| SearchHit {
                path: file.path.clone(),
                score,
                triggers: file.triggers.clone(),
            })
        })
        .collect();
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

/// Render the routing manifest: fixed preamble, one line per file, and an
/// installed-packages section when any package is installed. Pure
/// projection of its inputs.
pub fn generate_routing_manifest(
    inventory: &[FileInfo],
    installed: &[InstalledPackage],
) -> String {
    let mut out = String::from(MANIFEST_PREAMBLE);
    out.push_str("\n## Files\n\n");
    if inventory.is_empty() {
        out.push_str("(no knowledge files)\n");
    }
    for file in inventory {
        match file.kind {
            FileKind::Markdown => {
                let triggers = if file.triggers.is_empty() {
                    "(none)".to_string()
                } else {
                    file.triggers.join(", ")
                };
                out.push_str(&format!("- {} — triggers: {}\n", file.path, triggers));
            }
            FileKind::StructuredLog => {
                let schema = file.schema.as_deref().unwrap_or("(unknown schema)");
                out.push_str(&format!("- {} — schema: {}\n", file.path, schema));
            }
        }
    }
    if !installed.is_empty() {
        out.push_str("\n## Installed packages\n\n");
        for pkg in installed {
            out.push_str(&format!(
                "- {} (v{}, {} files) — triggers: {}\n",
                pkg.id,
                pkg.version,
                pkg.file_count,
                if pkg.triggers.is_empty() {
                    "(none)".to_string()
                } else {
                    pkg.triggers.join(", ")
                }
            ));
        }
    }
    out
}

/// Rebuild the manifest from the tree and write it wholesale.
pub fn regenerate(root: &Path, installed: &[InstalledPackage]) -> anyhow::Result<PathBuf> {
    let inventory = build_file_inventory(root);
    let manifest = generate_routing_manifest(&inventory, installed);
    std::fs::create_dir_all(root)?;
    let path = root.join(ROUTING_FILE);
    std::fs::write(&path, manifest)?;
    Ok(path)
}
