//! Sync orchestration.
//!
//! Every installed package is processed independently; one package's
//! failure never aborts the rest, and the command aggregates a final
//! updated/current/failed tally. Subscription lapses keep local files and
//! annotate the package manifest instead of deleting anything.

use crate::catalog::{Catalog, CatalogError};
use crate::domain::models::{
    InstalledPackage, SubscriptionStatus, SyncAction, SyncEvent, SyncReport, SyncTally,
};
use crate::services::cache::PackageCache;
use crate::services::credentials::{self, SecretStore};
use crate::services::{install, integrity, router};
use std::path::Path;
use tracing::{info, warn};

const LAPSE_BANNER: &str = "> **Warning:** synchronization has stopped for this package";

/// `true` when `remote` is strictly newer than `local` by dotted numeric
/// comparison. Sync never downgrades: anything not newer is "current".
pub fn version_newer(remote: &str, local: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split(['.', '-'])
            .map(|seg| seg.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .map(|digits| digits.parse().unwrap_or(0))
            .collect()
    };
    let r = parse(remote);
    let l = parse(local);
    for i in 0..r.len().max(l.len()) {
        let a = r.get(i).copied().unwrap_or(0);
        let b = l.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }
    false
}

/// Prepend the lapse banner to the installed manifest, once.
fn annotate_manifest(dir: &Path, reason: &str) {
    let path = dir.join("MANIFEST.md");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.contains(LAPSE_BANNER) {
        return;
    }
    let banner = format!(
        "{} ({}). Local files are kept but no longer receive updates.\n\n",
        LAPSE_BANNER, reason
    );
    let _ = std::fs::write(&path, format!("{}{}", banner, existing));
}

fn lapse(
    cache: &PackageCache,
    root: &Path,
    row: &InstalledPackage,
    status: SubscriptionStatus,
) -> SyncReport {
    warn!(
        package = row.id.as_str(),
        status = status.as_str(),
        "subscription lapsed; keeping local files"
    );
    let _ = cache.cache_subscription_status(&row.id, status);
    let slug = if row.slug.is_empty() { &row.id } else { &row.slug };
    annotate_manifest(&root.join(slug), status.as_str());
    let _ = cache.append_event(&SyncEvent {
        package_id: row.id.clone(),
        action: SyncAction::SubscriptionCheck,
        version_before: Some(row.version.clone()),
        version_after: Some(row.version.clone()),
        changed_paths: vec![],
        at: chrono::Utc::now().to_rfc3339(),
    });
    SyncReport {
        package_id: row.id.clone(),
        status: status.as_str().to_string(),
        old_version: Some(row.version.clone()),
        new_version: None,
        changed: vec![],
        added: vec![],
        files_dropped: 0,
        error: None,
    }
}

fn failed(row: &InstalledPackage, err: String) -> SyncReport {
    SyncReport {
        package_id: row.id.clone(),
        status: "failed".to_string(),
        old_version: Some(row.version.clone()),
        new_version: None,
        changed: vec![],
        added: vec![],
        files_dropped: 0,
        error: Some(err),
    }
}

fn sync_one(
    catalog: &Catalog,
    cache: &PackageCache,
    store: &dyn SecretStore,
    root: &Path,
    row: &InstalledPackage,
) -> SyncReport {
    let remote = match catalog.get_version(&row.id) {
        Ok(v) => v,
        Err(CatalogError::SubscriptionRequired(_)) => {
            return lapse(cache, root, row, SubscriptionStatus::Expired)
        }
        Err(CatalogError::Forbidden(_)) => {
            return lapse(cache, root, row, SubscriptionStatus::Cancelled)
        }
        Err(e) => return failed(row, e.to_string()),
    };

    if !version_newer(&remote.version, &row.version) {
        let mut updated = row.clone();
        updated.last_sync = Some(chrono::Utc::now().to_rfc3339());
        let _ = cache.upsert_installed(&updated);
        return SyncReport {
            package_id: row.id.clone(),
            status: "current".to_string(),
            old_version: Some(row.version.clone()),
            new_version: Some(remote.version),
            changed: vec![],
            added: vec![],
            files_dropped: 0,
            error: None,
        };
    }

    let token = match credentials::resolve_token(row.token.as_deref(), store, &row.id) {
        Ok(t) => t,
        Err(e) => return failed(row, e.to_string()),
    };
    let pkg = match catalog.get_files(&row.id, token.as_deref()) {
        Ok(p) => p,
        Err(CatalogError::SubscriptionRequired(_)) => {
            return lapse(cache, root, row, SubscriptionStatus::Expired)
        }
        Err(CatalogError::Forbidden(_)) => {
            return lapse(cache, root, row, SubscriptionStatus::Cancelled)
        }
        Err(e) => return failed(row, e.to_string()),
    };

    let set = match install::vet_files(&row.id, &pkg) {
        Ok(s) => s,
        Err(e) => return failed(row, e.to_string()),
    };

    let dir = root.join(&pkg.package.slug);
    let previous = integrity::load_integrity_record(&dir)
        .ok()
        .flatten()
        .map(|r| r.files)
        .unwrap_or_default();

    let digests = match install::write_vetted(&dir, &pkg.package.version, &set) {
        Ok(d) => d,
        Err(e) => return failed(row, e.to_string()),
    };

    // Files gone from the new set (removed upstream, or dropped by the
    // scanner this round) must not linger on disk.
    install::remove_stale_files(&dir, &previous, &digests);

    let mut changed = Vec::new();
    let mut added = Vec::new();
    for (path, digest) in &digests {
        match previous.get(path) {
            Some(old) if old == digest => {}
            Some(_) => changed.push(path.clone()),
            None => added.push(path.clone()),
        }
    }

    let mut updated = row.clone();
    let old_version = updated.version.clone();
    updated.version = pkg.package.version.clone();
    updated.file_count = digests.len();
    updated.triggers = pkg.package.triggers.clone();
    updated.status = SubscriptionStatus::Active;
    updated.last_sync = Some(chrono::Utc::now().to_rfc3339());
    if let Err(e) = cache.upsert_installed(&updated) {
        return failed(row, e.to_string());
    }
    let mut event_paths = changed.clone();
    event_paths.extend(added.iter().cloned());
    let _ = cache.append_event(&SyncEvent {
        package_id: row.id.clone(),
        action: SyncAction::Sync,
        version_before: Some(old_version.clone()),
        version_after: Some(pkg.package.version.clone()),
        changed_paths: event_paths,
        at: chrono::Utc::now().to_rfc3339(),
    });

    info!(
        package = row.id.as_str(),
        from = old_version.as_str(),
        to = pkg.package.version.as_str(),
        changed = changed.len(),
        added = added.len(),
        "synced"
    );
    SyncReport {
        package_id: row.id.clone(),
        status: "updated".to_string(),
        old_version: Some(old_version),
        new_version: Some(pkg.package.version),
        changed,
        added,
        files_dropped: set.dropped.len(),
        error: None,
    }
}

pub fn sync_packages(
    catalog: &Catalog,
    cache: &PackageCache,
    store: &dyn SecretStore,
    root: &Path,
    only: Option<&str>,
) -> anyhow::Result<(Vec<SyncReport>, SyncTally)> {
    if let Some(id) = only {
        if cache.get_installed(id)?.is_none() {
            anyhow::bail!("package not installed: {}", id);
        }
    }

    let mut reports = Vec::new();
    let mut tally = SyncTally::default();
    let mut any_updated = false;

    for row in cache.list_installed()? {
        if only.map(|id| id != row.id).unwrap_or(false) {
            continue;
        }
        let report = sync_one(catalog, cache, store, root, &row);
        match report.status.as_str() {
            "updated" => {
                tally.updated += 1;
                any_updated = true;
            }
            "current" => tally.current += 1,
            _ => tally.failed += 1,
        }
        reports.push(report);
    }

    if any_updated {
        let installed = cache.list_installed()?;
        router::regenerate(root, &installed)?;
    }
    Ok((reports, tally))
}
