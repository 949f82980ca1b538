//! Install pipeline.
//!
//! Linear and fail-fast: resolve auth, short-circuit when the installed
//! version is already current, fetch, scan every file, verify every
//! catalog-supplied hash, and only then touch the disk. Validation runs
//! to completion before any write so a failing batch leaves zero files
//! behind.

use crate::catalog::Catalog;
use crate::domain::models::{
    InstallReport, InstalledPackage, PackageFiles, SubscriptionStatus, SyncAction, SyncEvent,
};
use crate::services::cache::PackageCache;
use crate::services::credentials::{self, SecretStore};
use crate::services::{integrity, router, scanner, storage};
use anyhow::{bail, Context};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

pub struct InstallOptions<'a> {
    pub token: Option<&'a str>,
    pub free: bool,
}

/// One file that passed every gate and is cleared to be written.
#[derive(Debug)]
pub struct VettedFile {
    pub path: String,
    pub content: String,
    pub digest: String,
}

#[derive(Debug)]
pub struct VettedSet {
    pub files: Vec<VettedFile>,
    pub dropped: Vec<String>,
}

/// Run the scan + hash pipeline over a fetched file set without writing
/// anything. Files at or above the drop threshold are removed from the
/// set and recorded to the audit log; a single hash mismatch or unsafe
/// path fails the whole batch.
pub fn vet_files(package_id: &str, pkg: &PackageFiles) -> anyhow::Result<VettedSet> {
    let mut files = Vec::new();
    let mut dropped = Vec::new();
    for (path, remote) in &pkg.files {
        if !storage::safe_relative_path(path) {
            bail!(
                "package {} contains an unsafe file path: {}",
                package_id,
                path
            );
        }
        let scan = scanner::scan_file_confidence(&remote.content);
        if scan.confidence >= scanner::INJECTION_DROP_THRESHOLD {
            warn!(
                package = package_id,
                path = path.as_str(),
                confidence = scan.confidence,
                "dropping file flagged by injection scan"
            );
            storage::audit(
                "security_drop",
                serde_json::json!({
                    "package": package_id,
                    "path": path,
                    "confidence": scan.confidence,
                    "patterns": scan.matched_patterns,
                }),
            );
            dropped.push(path.clone());
            continue;
        }
        if let Some(expected) = &remote.hash {
            integrity::verify_expected(path, &remote.content, expected)
                .with_context(|| format!("integrity check failed for package {}", package_id))?;
        }
        files.push(VettedFile {
            path: path.clone(),
            content: remote.content.clone(),
            digest: integrity::hash_content(&remote.content),
        });
    }
    Ok(VettedSet { files, dropped })
}

/// Write a vetted set under the package directory and persist the
/// integrity record. Returns path -> digest for the written files.
pub fn write_vetted(
    dir: &Path,
    version: &str,
    set: &VettedSet,
) -> anyhow::Result<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();
    for file in &set.files {
        let full = dir.join(&file.path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, &file.content)?;
        digests.insert(file.path.clone(), file.digest.clone());
    }
    integrity::write_integrity_record(dir, version, &digests)?;
    Ok(digests)
}

/// Remove files recorded by the previous install that the new file set no
/// longer contains. A stale file would sit outside the new integrity
/// record and keep surfacing in the routing manifest.
pub fn remove_stale_files(
    dir: &Path,
    previous: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) {
    for stale in previous.keys().filter(|p| !current.contains_key(*p)) {
        let _ = std::fs::remove_file(dir.join(stale));
    }
}

/// Top-level directories covered by a file set.
pub fn domains_of(files: &[VettedFile]) -> Vec<String> {
    let mut out = BTreeSet::new();
    for file in files {
        if let Some((head, _)) = file.path.split_once('/') {
            out.insert(head.to_string());
        }
    }
    out.into_iter().collect()
}

pub fn install_package(
    catalog: &Catalog,
    cache: &PackageCache,
    store: &dyn SecretStore,
    root: &Path,
    package_id: &str,
    opts: &InstallOptions,
) -> anyhow::Result<InstallReport> {
    let token = credentials::resolve_token(opts.token, store, package_id)?;
    if token.is_none() && !opts.free {
        bail!(
            "no access token for package {}; pass --token, set {}, or use --free for free packages",
            package_id,
            credentials::TOKEN_ENV
        );
    }

    let remote = catalog
        .get_version(package_id)
        .with_context(|| format!("fetch version for package {}", package_id))?;
    let previous = cache.get_installed(package_id)?;
    if let Some(existing) = &previous {
        if existing.version == remote.version {
            info!(package = package_id, version = remote.version.as_str(), "already up to date");
            return Ok(InstallReport {
                package_id: package_id.to_string(),
                name: existing.name.clone(),
                version: existing.version.clone(),
                status: "already_installed".to_string(),
                files_written: 0,
                files_dropped: 0,
                domains: Vec::new(),
            });
        }
    }

    let mut pkg = catalog
        .get_files(package_id, token.as_deref())
        .with_context(|| format!("fetch files for package {}", package_id))?;
    // A catalog may ship the manifest outside the file map.
    if !pkg.manifest.is_empty() && !pkg.files.contains_key("MANIFEST.md") {
        pkg.files.insert(
            "MANIFEST.md".to_string(),
            crate::domain::models::RemoteFile {
                content: pkg.manifest.clone(),
                hash: None,
                load_for: pkg.package.triggers.clone(),
            },
        );
    }

    let set = vet_files(package_id, &pkg)?;
    let dir = root.join(&pkg.package.slug);
    let previous_files = integrity::load_integrity_record(&dir)
        .ok()
        .flatten()
        .map(|r| r.files)
        .unwrap_or_default();
    let digests = write_vetted(&dir, &pkg.package.version, &set)?;
    remove_stale_files(&dir, &previous_files, &digests);

    let row = InstalledPackage {
        id: package_id.to_string(),
        slug: pkg.package.slug.clone(),
        name: pkg.package.name.clone(),
        version: pkg.package.version.clone(),
        token,
        installed_at: chrono::Utc::now().to_rfc3339(),
        last_sync: Some(chrono::Utc::now().to_rfc3339()),
        status: SubscriptionStatus::Active,
        file_count: digests.len(),
        triggers: pkg.package.triggers.clone(),
    };
    cache.upsert_installed(&row)?;
    cache.append_event(&SyncEvent {
        package_id: package_id.to_string(),
        action: SyncAction::Install,
        version_before: previous.as_ref().map(|r| r.version.clone()),
        version_after: Some(pkg.package.version.clone()),
        changed_paths: digests.keys().cloned().collect(),
        at: chrono::Utc::now().to_rfc3339(),
    })?;

    let installed = cache.list_installed()?;
    router::regenerate(root, &installed)?;

    info!(
        package = package_id,
        version = pkg.package.version.as_str(),
        files = set.files.len(),
        dropped = set.dropped.len(),
        "installed"
    );
    Ok(InstallReport {
        package_id: package_id.to_string(),
        name: pkg.package.name,
        version: pkg.package.version,
        status: "installed".to_string(),
        files_written: set.files.len(),
        files_dropped: set.dropped.len(),
        domains: domains_of(&set.files),
    })
}
