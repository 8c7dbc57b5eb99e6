use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vellum::cli::{Cli, Commands};
use vellum::commands;
use vellum_core::Vault;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // `init` is the one command that must run without an existing vault.
    match cli.command {
        Commands::Init(args) => commands::handle_init(args).await,
        command => {
            let vault = resolve_vault(cli.vault).await?;
            match command {
                Commands::List(args) => commands::handle_list(args, &vault).await,
                Commands::New(args) => commands::handle_new(args, &vault).await,
                Commands::Show(args) => commands::handle_show(args, &vault).await,
                Commands::Rm(args) => commands::handle_rm(args, &vault).await,
                Commands::Mv(args) => commands::handle_mv(args, &vault).await,
                Commands::Rename(args) => commands::handle_rename(args, &vault).await,
                Commands::Backlinks(args) => commands::handle_backlinks(args, &vault).await,
                Commands::Check(args) => commands::handle_check(args, &vault).await,
                Commands::Init(_) => unreachable!(),
            }
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn resolve_vault(flag: Option<PathBuf>) -> Result<Vault> {
    if let Some(path) = flag {
        // Open the vault at the specified path
        return Vault::open(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open vault at {}: {}", path.display(), e));
    }

    // If no vault is specified, find it in the current directory or its parents
    let mut dir = std::env::current_dir()?;
    loop {
        if let Ok(vault) = Vault::open(&dir).await {
            return Ok(vault);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => anyhow::bail!("No vault found in current directory or its parents"),
        }
    }
}
