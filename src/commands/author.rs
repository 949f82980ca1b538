use crate::catalog::Catalog;
use crate::cli::{Cli, Commands, TokenCommands};
use crate::services::credentials::{self, SecretStore};
use crate::services::output::emit_one;
use crate::services::publish;
use crate::services::storage::Config;
use std::io::IsTerminal;
use std::path::PathBuf;

pub fn handle_author_commands(
    cli: &Cli,
    store: &dyn SecretStore,
    catalog_source: &str,
    config: &Config,
) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Publish {
            dir,
            init,
            name,
            dry_run,
            yes,
            token,
        } => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
            if *init {
                let package_name = name.clone().unwrap_or_else(|| "My Package".to_string());
                publish::scaffold_package(&dir, &package_name)?;
                emit_one(cli.json, dir.display().to_string(), |d| {
                    format!("scaffolded package in {}; edit MANIFEST.md before publishing", d)
                })?;
                return Ok(());
            }

            let assume_yes = *yes;
            let interactive = std::io::stdin().is_terminal();
            let mut confirm = |finding: &str| -> bool {
                if assume_yes {
                    return true;
                }
                // Non-interactive default is "no": a service context never
                // silently ships a flagged file.
                if !interactive {
                    return false;
                }
                eprint!("{} — publish anyway? [y/N] ", finding);
                let mut line = String::new();
                if std::io::stdin().read_line(&mut line).is_err() {
                    return false;
                }
                matches!(line.trim(), "y" | "Y" | "yes")
            };

            let catalog = Catalog::new(catalog_source)?;
            let report = publish::publish_package(
                &catalog,
                store,
                &dir,
                config.min_package_files,
                &publish::PublishOptions {
                    token: token.as_deref(),
                    dry_run: *dry_run,
                },
                &mut confirm,
            )?;
            emit_one(cli.json, report, |r| {
                let diff = format!(
                    "+{} ~{} -{}",
                    r.diff.added.len(),
                    r.diff.changed.len(),
                    r.diff.removed.len()
                );
                if r.uploaded {
                    format!("published {} v{} ({} files, diff {})", r.package_id, r.version, r.file_count, diff)
                } else {
                    format!("dry run: {} v{} valid ({} files, diff {})", r.package_id, r.version, r.file_count, diff)
                }
            })?;
        }
        Commands::Token { command } => match command {
            TokenCommands::Set { value, package } => {
                let key = package.as_deref().unwrap_or(credentials::DEFAULT_KEY);
                store.set(key, value)?;
                emit_one(cli.json, key.to_string(), |k| format!("token stored for {}", k))?;
            }
            TokenCommands::Show { package } => {
                let key = package.as_deref().unwrap_or(credentials::DEFAULT_KEY);
                match store.get(key)? {
                    Some(token) => emit_one(cli.json, token, |t| t.clone())?,
                    None => anyhow::bail!("no token stored for {}", key),
                }
            }
            TokenCommands::Clear { package } => {
                let key = package.as_deref().unwrap_or(credentials::DEFAULT_KEY);
                let removed = store.clear(key)?;
                emit_one(cli.json, removed, |r| {
                    if *r {
                        format!("token cleared for {}", key)
                    } else {
                        format!("no token stored for {}", key)
                    }
                })?;
            }
        },
        _ => unreachable!("handled by the runtime command tree"),
    }
    Ok(())
}
