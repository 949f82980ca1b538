//! Publish pipeline.
//!
//! Gates run before any network call: validation first (all problems
//! reported as a list, so a creator fixes everything in one pass), then
//! the security gate (hard blocks abort, soft findings require explicit
//! confirmation), then an operator-facing diff against the currently
//! published set. `--dry-run` stops after the diff.

use crate::catalog::{Catalog, CatalogError};
use crate::domain::models::{DiffReport, PackageFiles, PackageMeta, PublishReport, RemoteFile};
use crate::services::credentials::SecretStore;
use crate::services::{credentials, integrity, router, scanner, storage};
use anyhow::bail;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

pub const MANIFEST_NAME: &str = "MANIFEST.md";

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "sh", "bash", "ps1", "dll", "so", "dylib", "bin", "msi", "app",
];

#[derive(Debug, Default, Clone)]
pub struct PackageManifest {
    pub name: String,
    pub creator: String,
    pub version: String,
    pub description: String,
    pub triggers: Vec<String>,
}

/// Parse the creator-authored manifest: a `# Name` heading followed by
/// `Key: value` metadata lines. Missing fields stay empty and surface as
/// validation errors.
pub fn parse_manifest(content: &str) -> PackageManifest {
    let mut manifest = PackageManifest::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if manifest.name.is_empty() {
            if let Some(name) = trimmed.strip_prefix("# ") {
                manifest.name = name.trim().to_string();
                continue;
            }
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "creator" => manifest.creator = value.to_string(),
                "version" => manifest.version = value.to_string(),
                "description" => manifest.description = value.to_string(),
                "load for" => {
                    manifest.triggers = value
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                }
                _ => {}
            }
        }
    }
    manifest
}

pub fn slugify(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if (c == ' ' || c == '-' || c == '_') && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn looks_like_semver(v: &str) -> bool {
    let parts: Vec<&str> = v.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Collect publishable files: relative path -> content. Dotfiles, the
/// integrity record and the generated routing manifest never ship.
pub fn collect_files(dir: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    collect_into(dir, dir, &mut out)?;
    Ok(out)
}

fn collect_into(
    root: &Path,
    dir: &Path,
    out: &mut BTreeMap<String, String>,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == router::ROUTING_FILE {
            continue;
        }
        if path.is_dir() {
            collect_into(root, &path, out)?;
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        // Executable payloads surface later as validation errors, so they
        // are collected here; unreadable (binary) content is what bails.
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("unreadable file {}: {}", rel, e))?;
        out.insert(rel, content);
    }
    Ok(())
}

/// Run every validation check and return the full error list.
pub fn validate_package(
    manifest: &PackageManifest,
    files: &BTreeMap<String, String>,
    min_files: usize,
) -> Vec<String> {
    let mut errors = Vec::new();
    if !files.contains_key(MANIFEST_NAME) {
        errors.push(format!("missing {}", MANIFEST_NAME));
    }
    if manifest.name.is_empty() {
        errors.push("manifest is missing a name heading (`# Name`)".to_string());
    }
    if manifest.creator.is_empty() {
        errors.push("manifest is missing `Creator:`".to_string());
    }
    if manifest.version.is_empty() {
        errors.push("manifest is missing `Version:`".to_string());
    } else if !looks_like_semver(&manifest.version) {
        errors.push(format!(
            "version `{}` is not of the form MAJOR.MINOR.PATCH",
            manifest.version
        ));
    }
    if manifest.description.is_empty() {
        errors.push("manifest is missing `Description:`".to_string());
    }
    if manifest.triggers.is_empty() {
        errors.push("manifest needs at least one trigger on its `Load for:` line".to_string());
    }
    if files.len() < min_files {
        errors.push(format!(
            "package has {} files; at least {} required",
            files.len(),
            min_files
        ));
    }
    for path in files.keys() {
        let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        if EXECUTABLE_EXTENSIONS.contains(&ext.as_str()) {
            errors.push(format!("executable files are not allowed: {}", path));
        }
    }
    for (path, content) in files {
        let is_markdown = path.ends_with(".md") || path.ends_with(".markdown");
        if is_markdown && router::extract_triggers(content).is_empty() {
            errors.push(format!("{} is missing a `Load for:` metadata line", path));
        }
    }
    errors
}

pub struct SecurityGate {
    /// Hard blocks: publish aborts, creator must edit.
    pub blocks: Vec<String>,
    /// Soft findings requiring explicit confirmation.
    pub warnings: Vec<String>,
}

/// Scan every file with the package-file injection detector and the PII
/// scanner, splitting findings into hard blocks and confirmable warnings.
pub fn security_gate(files: &BTreeMap<String, String>) -> SecurityGate {
    let mut blocks = Vec::new();
    let mut warnings = Vec::new();
    for (path, content) in files {
        let scan = scanner::scan_package_file(content);
        if scan.confidence >= scanner::INJECTION_DROP_THRESHOLD {
            blocks.push(format!(
                "{}: injection pattern (confidence {:.2}): {}",
                path,
                scan.confidence,
                scan.matched_patterns.join("; ")
            ));
        } else if scan.confidence >= scanner::INJECTION_WARN_THRESHOLD {
            warnings.push(format!(
                "{}: possible injection pattern (confidence {:.2})",
                path, scan.confidence
            ));
        }
        let pii = scanner::scan_for_pii(content);
        if pii.has_hard_block {
            let kinds: Vec<&str> = pii
                .entities
                .iter()
                .filter(|e| e.hard_block)
                .map(|e| e.kind.as_str())
                .collect();
            blocks.push(format!("{}: sensitive data ({})", path, kinds.join(", ")));
        } else if pii.has_pii {
            let kinds: Vec<&str> = pii.entities.iter().map(|e| e.kind.as_str()).collect();
            warnings.push(format!(
                "{}: personal data detected ({})",
                path,
                kinds.join(", ")
            ));
        }
    }
    SecurityGate { blocks, warnings }
}

/// Operator-facing diff against the currently published file set.
/// A never-published package diffs as all-added.
pub fn diff_against_published(
    catalog: &Catalog,
    package_id: &str,
    token: Option<&str>,
    files: &BTreeMap<String, String>,
) -> anyhow::Result<DiffReport> {
    let published = match catalog.get_files(package_id, token) {
        Ok(pkg) => pkg,
        Err(CatalogError::NotFound(_)) => {
            return Ok(DiffReport {
                added: files.keys().cloned().collect(),
                changed: vec![],
                removed: vec![],
            })
        }
        Err(e) => return Err(e.into()),
    };
    let mut diff = DiffReport::default();
    for (path, content) in files {
        match published.files.get(path) {
            None => diff.added.push(path.clone()),
            Some(remote) => {
                let remote_hash = remote
                    .hash
                    .clone()
                    .unwrap_or_else(|| integrity::hash_content(&remote.content));
                if remote_hash != integrity::hash_content(content) {
                    diff.changed.push(path.clone());
                }
            }
        }
    }
    for path in published.files.keys() {
        if !files.contains_key(path) {
            diff.removed.push(path.clone());
        }
    }
    Ok(diff)
}

/// Scaffold a new package directory for `--init`.
pub fn scaffold_package(dir: &Path, name: &str) -> anyhow::Result<()> {
    if dir.join(MANIFEST_NAME).exists() {
        bail!("{} already exists in {}", MANIFEST_NAME, dir.display());
    }
    std::fs::create_dir_all(dir.join("knowledge"))?;
    std::fs::write(
        dir.join(MANIFEST_NAME),
        format!(
            "# {}\n\nCreator: your-handle\nVersion: 0.1.0\nDescription: What this package teaches.\nLoad for: topic one, topic two\n",
            name
        ),
    )?;
    std::fs::write(
        dir.join("knowledge/getting-started.md"),
        "Load for: topic one\n\nWrite your first knowledge file here.\n",
    )?;
    Ok(())
}

pub struct PublishOptions<'a> {
    pub token: Option<&'a str>,
    pub dry_run: bool,
}

/// Validate, gate, diff and upload a package directory. `confirm` is
/// asked once per soft finding; refusing any of them aborts. In a
/// non-interactive context the caller supplies a `confirm` that always
/// declines (safe default).
pub fn publish_package(
    catalog: &Catalog,
    store: &dyn SecretStore,
    dir: &Path,
    min_files: usize,
    opts: &PublishOptions,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> anyhow::Result<PublishReport> {
    let files = collect_files(dir)?;
    let manifest_text = files.get(MANIFEST_NAME).cloned().unwrap_or_default();
    let manifest = parse_manifest(&manifest_text);

    let errors = validate_package(&manifest, &files, min_files);
    if !errors.is_empty() {
        bail!("package validation failed:\n  - {}", errors.join("\n  - "));
    }

    let gate = security_gate(&files);
    if !gate.blocks.is_empty() {
        storage::audit(
            "publish_blocked",
            serde_json::json!({"dir": dir.display().to_string(), "blocks": gate.blocks}),
        );
        bail!(
            "publish blocked by security scan:\n  - {}",
            gate.blocks.join("\n  - ")
        );
    }
    for warning in &gate.warnings {
        warn!(finding = warning.as_str(), "soft security finding");
        if !confirm(warning) {
            bail!("publish aborted: unconfirmed security finding: {}", warning);
        }
    }

    let slug = slugify(&manifest.creator);
    let token = credentials::resolve_token(opts.token, store, &slug)?;
    let diff = diff_against_published(catalog, &slug, token.as_deref(), &files)?;

    if opts.dry_run {
        return Ok(PublishReport {
            package_id: slug,
            version: manifest.version,
            file_count: files.len(),
            warnings: gate.warnings,
            diff,
            uploaded: false,
            message: "dry run; nothing uploaded".to_string(),
        });
    }

    let payload = PackageFiles {
        manifest: manifest_text,
        package: PackageMeta {
            id: slug.clone(),
            slug: slug.clone(),
            name: manifest.name.clone(),
            creator: manifest.creator.clone(),
            version: manifest.version.clone(),
            triggers: manifest.triggers.clone(),
        },
        files: files
            .iter()
            .map(|(path, content)| {
                (
                    path.clone(),
                    RemoteFile {
                        content: content.clone(),
                        hash: Some(integrity::hash_content(content)),
                        load_for: router::extract_triggers(content),
                    },
                )
            })
            .collect(),
    };

    let response = catalog.publish(token.as_deref(), &payload)?;
    storage::audit(
        "publish",
        serde_json::json!({
            "package": response.package_id,
            "version": response.version,
            "files": files.len(),
        }),
    );
    info!(
        package = response.package_id.as_str(),
        version = response.version.as_str(),
        "published"
    );
    Ok(PublishReport {
        package_id: response.package_id,
        version: response.version,
        file_count: files.len(),
        warnings: gate.warnings,
        diff,
        uploaded: true,
        message: response.message,
    })
}
