use crate::catalog::Catalog;
use crate::cli::{Cli, Commands};
use crate::domain::models::{PackageStatusReport, StatusReport};
use crate::services::cache::PackageCache;
use crate::services::credentials::SecretStore;
use crate::services::output::{emit_one, emit_outcome, emit_rows};
use crate::services::{install, integrity, router, storage, sync, watcher};
use std::time::Duration;

pub fn handle_runtime_commands(
    cli: &Cli,
    cache: &PackageCache,
    store: &dyn SecretStore,
    catalog_source: &str,
) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Install {
            package_id,
            token,
            free,
        } => {
            let catalog = Catalog::new(catalog_source)?;
            let report = install::install_package(
                &catalog,
                cache,
                store,
                &cli.root,
                package_id,
                &install::InstallOptions {
                    token: token.as_deref(),
                    free: *free,
                },
            )?;
            storage::audit(
                "install",
                serde_json::json!({"package": report.package_id, "status": report.status}),
            );
            emit_one(cli.json, report, |r| match r.status.as_str() {
                "already_installed" => {
                    format!("{} v{} already up to date", r.package_id, r.version)
                }
                _ => format!(
                    "installed {} v{} ({} files, {} dropped by scan)",
                    r.package_id, r.version, r.files_written, r.files_dropped
                ),
            })?;
        }
        Commands::Sync { package_id } => {
            let catalog = Catalog::new(catalog_source)?;
            let (reports, tally) = sync::sync_packages(
                &catalog,
                cache,
                store,
                &cli.root,
                package_id.as_deref(),
            )?;
            storage::audit(
                "sync",
                serde_json::json!({
                    "updated": tally.updated,
                    "current": tally.current,
                    "failed": tally.failed,
                }),
            );
            if cli.json {
                emit_outcome(
                    true,
                    tally.failed == 0,
                    serde_json::json!({"packages": reports, "tally": tally}),
                    |_| String::new(),
                )?;
            } else {
                for r in &reports {
                    match &r.error {
                        Some(e) => println!("{}\t{}\t{}", r.package_id, r.status, e),
                        None => println!("{}\t{}", r.package_id, r.status),
                    }
                }
                println!(
                    "sync complete: {} updated, {} current, {} failed",
                    tally.updated, tally.current, tally.failed
                );
            }
            if tally.failed > 0 {
                anyhow::bail!("{} package(s) failed to sync", tally.failed);
            }
        }
        Commands::Remove { package_id } => {
            let Some(row) = cache.get_installed(package_id)? else {
                anyhow::bail!("package not installed: {}", package_id);
            };
            let slug = if row.slug.is_empty() {
                row.id.clone()
            } else {
                row.slug.clone()
            };
            let dir = cli.root.join(&slug);
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            cache.remove_installed(package_id)?;
            storage::audit("remove", serde_json::json!({"package": package_id}));
            let installed = cache.list_installed()?;
            router::regenerate(&cli.root, &installed)?;
            emit_one(cli.json, package_id.clone(), |id| {
                format!("removed {}", id)
            })?;
        }
        Commands::Status {
            check_subscriptions,
        } => {
            let installed = cache.list_installed()?;
            let mut packages = Vec::new();
            for row in &installed {
                let slug = if row.slug.is_empty() { &row.id } else { &row.slug };
                let failures = integrity::verify_integrity(&cli.root.join(slug))?;
                packages.push(PackageStatusReport {
                    id: row.id.clone(),
                    name: row.name.clone(),
                    version: row.version.clone(),
                    status: row.status,
                    file_count: row.file_count,
                    last_sync: row.last_sync.clone(),
                    integrity_failures: failures,
                });
            }
            let subscription_checks = if *check_subscriptions {
                let tokens: Vec<String> =
                    installed.iter().filter_map(|r| r.token.clone()).collect();
                if tokens.is_empty() {
                    Vec::new()
                } else {
                    Catalog::new(catalog_source)?.validate_subscriptions(&tokens)?
                }
            } else {
                Vec::new()
            };
            let report = StatusReport {
                packages,
                last_sync: cache.last_sync_time()?.map(|t| t.to_rfc3339()),
                subscription_checks,
            };
            if cli.json {
                emit_one(true, report, |_| String::new())?;
            } else {
                if report.packages.is_empty() {
                    println!("no packages installed");
                }
                for p in &report.packages {
                    let integrity = if p.integrity_failures.is_empty() {
                        "ok".to_string()
                    } else {
                        format!("INTEGRITY FAILED: {}", p.integrity_failures.join(", "))
                    };
                    println!(
                        "{}\tv{}\t{}\t{} files\t{}",
                        p.id,
                        p.version,
                        p.status.as_str(),
                        p.file_count,
                        integrity
                    );
                }
                if let Some(ts) = &report.last_sync {
                    println!("last sync: {}", ts);
                }
            }
        }
        Commands::List => {
            let installed = cache.list_installed()?;
            emit_rows(cli.json, &installed, |p| {
                format!("{}\t{}\t{}", p.id, p.version, p.status.as_str())
            })?;
        }
        Commands::Search { query } => {
            let inventory = router::build_file_inventory(&cli.root);
            let hits = router::search(query, &inventory);
            emit_rows(cli.json, &hits, |h| {
                format!("{}\t{}\t{}", h.score, h.path, h.triggers.join(", "))
            })?;
        }
        Commands::Route => {
            let installed = cache.list_installed()?;
            let path = router::regenerate(&cli.root, &installed)?;
            emit_one(cli.json, path.display().to_string(), |p| {
                format!("routing manifest written to {}", p)
            })?;
        }
        Commands::Watch {
            interval_ms,
            debounce_ms,
        } => {
            let installed = cache.list_installed()?;
            router::regenerate(&cli.root, &installed)?;
            let tree = watcher::TreeWatcher::new(
                cli.root.clone(),
                Duration::from_millis(*interval_ms),
                Duration::from_millis(*debounce_ms),
            );
            tree.run(
                || true,
                |root, changed| {
                    tracing::info!(count = changed.len(), "regenerating routing manifest");
                    match cache.list_installed() {
                        Ok(installed) => {
                            if let Err(e) = router::regenerate(root, &installed) {
                                tracing::warn!("routing manifest regeneration failed: {}", e);
                            }
                        }
                        Err(e) => tracing::warn!("cache read failed: {}", e),
                    }
                },
            );
        }
        Commands::Publish { .. } | Commands::Token { .. } => {
            unreachable!("handled by the author command tree")
        }
    }
    Ok(())
}
