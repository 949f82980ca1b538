use clap::Parser;

mod catalog;
mod cli;
mod commands;
mod domain;
mod services;

use cli::{Cli, Commands};
use services::cache::PackageCache;
use services::{credentials, output, storage};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mindpack=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        output::emit_error(cli.json, &err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = storage::load_config()?;
    let catalog_source = cli.catalog.clone().unwrap_or_else(|| config.catalog.clone());
    let store = credentials::open_default_store()?;

    match &cli.command {
        Commands::Publish { .. } | Commands::Token { .. } => {
            commands::handle_author_commands(cli, store.as_ref(), &catalog_source, &config)
        }
        _ => {
            let cache = PackageCache::open(&storage::cache_db_path()?)?;
            commands::handle_runtime_commands(cli, &cache, store.as_ref(), &catalog_source)
        }
    }
}
