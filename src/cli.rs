use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mindpack", version, about = "Knowledge-package distribution CLI")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Catalog source (https URL or local catalog directory); overrides config"
    )]
    pub catalog: Option<String>,
    #[arg(
        long,
        global = true,
        default_value = "mindsets",
        help = "Knowledge tree root where packages are installed"
    )]
    pub root: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a package from the catalog
    Install {
        package_id: String,
        #[arg(long, help = "Access token; defaults to env/credential store")]
        token: Option<String>,
        #[arg(long, default_value_t = false, help = "Package is free; no token required")]
        free: bool,
    },
    /// Sync installed packages against the catalog
    Sync {
        package_id: Option<String>,
    },
    /// Validate, scan and upload a package directory
    Publish {
        dir: Option<PathBuf>,
        #[arg(long, default_value_t = false, help = "Scaffold a new package directory")]
        init: bool,
        #[arg(long, help = "Package name used with --init")]
        name: Option<String>,
        #[arg(long, default_value_t = false, help = "Validate and diff without uploading")]
        dry_run: bool,
        #[arg(long, default_value_t = false, help = "Answer yes to soft-warning prompts")]
        yes: bool,
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove an installed package and its files
    Remove {
        package_id: String,
    },
    /// Installed packages, integrity and subscription health
    Status {
        #[arg(long, default_value_t = false)]
        check_subscriptions: bool,
    },
    /// List installed packages (machine-readable)
    List,
    /// Rank knowledge files against a query
    Search {
        query: String,
    },
    /// Regenerate the routing manifest from the knowledge tree
    Route,
    /// Watch the knowledge tree and regenerate the routing manifest on change
    Watch {
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        #[arg(long, default_value_t = 1500)]
        debounce_ms: u64,
    },
    /// Manage stored access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    Set {
        value: String,
        #[arg(long, help = "Scope the token to one package id")]
        package: Option<String>,
    },
    Show {
        #[arg(long)]
        package: Option<String>,
    },
    Clear {
        #[arg(long)]
        package: Option<String>,
    },
}
