//! Wahay configuration tool: entry point.
//!
//! A small operator binary for inspecting and managing the encrypted
//! configuration file outside the desktop client, e.g. on a headless box or
//! when recovering from a forgotten setting.
//!
//! # Usage
//!
//! ```text
//! wahay-config [OPTIONS] <COMMAND>
//!
//! Commands:
//!   show     Decrypt the configuration file and print its settings
//!   init     Write baseline settings to a new encrypted file
//!   forget   Disable persistence and delete the file and its backup
//!
//! Options:
//!   --config <PATH>   Use this file instead of the well-known locations
//! ```
//!
//! # Environment variables
//!
//! | Variable              | Description                                      |
//! |-----------------------|--------------------------------------------------|
//! | `WAHAY_CONFIG_PATH`   | Same as `--config`                               |
//! | `WAHAY_CONFIG_SECRET` | Passphrase that protects the configuration file  |
//! | `RUST_LOG`            | Log filter, defaults to `info`                   |
//!
//! The passphrase is only read from the environment so that it never shows
//! up in the process list.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use wahay_config::{ConfigurationStore, FsConfigFiles, LoadOutcome};
use wahay_core::PassphraseKeyManager;

const SECRET_ENV: &str = "WAHAY_CONFIG_SECRET";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Manage Wahay's encrypted configuration file.
#[derive(Debug, Parser)]
#[command(name = "wahay-config", version)]
struct Cli {
    /// Path of the configuration file.
    ///
    /// When omitted, the platform config directory and the legacy `~/.wahay`
    /// directory are searched, and new files go to the platform directory.
    #[arg(long, env = "WAHAY_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decrypt the configuration file and print its settings as TOML.
    Show,
    /// Write baseline settings to a new encrypted configuration file.
    Init,
    /// Disable persistence: delete the configuration file and its backup.
    Forget,
}

impl Cli {
    /// Builds a store over `--config` or over the well-known locations.
    fn store(&self, key_manager: PassphraseKeyManager) -> ConfigurationStore {
        match &self.config {
            Some(path) => ConfigurationStore::new(
                Box::new(key_manager),
                Box::new(FsConfigFiles::with_search_paths(vec![path.clone()])),
            ),
            None => ConfigurationStore::on_disk(key_manager),
        }
    }
}

/// Builds a key manager that offers the environment passphrase once.
///
/// A non-interactive tool cannot ask again, so a second prompt is declined.
fn key_manager_from_env() -> PassphraseKeyManager {
    let secret = std::env::var(SECRET_ENV).ok().map(Zeroizing::new);
    PassphraseKeyManager::new(Box::new(move |failed_attempts| {
        if failed_attempts > 0 {
            return None;
        }
        secret.clone()
    }))
}

fn require_secret() -> anyhow::Result<()> {
    match std::env::var_os(SECRET_ENV) {
        Some(value) if !value.is_empty() => Ok(()),
        _ => bail!("{SECRET_ENV} must be set to the configuration passphrase"),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn show(store: &mut ConfigurationStore) -> anyhow::Result<()> {
    require_secret()?;
    let Some(path) = store
        .detect_persistence()
        .context("failed to look for a configuration file")?
    else {
        bail!("no configuration file found");
    };

    match store
        .load_from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?
    {
        LoadOutcome::Loaded => {}
        LoadOutcome::RetryWithNewSecret => {
            bail!("{SECRET_ENV} does not unlock {}", path.display())
        }
        LoadOutcome::NotPersistent => bail!("persistence is disabled"),
    }

    let text = store
        .settings()
        .to_toml()
        .context("failed to render settings")?;
    println!("# {}", path.display());
    print!("{text}");
    Ok(())
}

fn init(store: &mut ConfigurationStore, config: Option<PathBuf>) -> anyhow::Result<()> {
    require_secret()?;
    if let Some(existing) = store
        .detect_persistence()
        .context("failed to look for a configuration file")?
    {
        bail!(
            "a configuration file already exists at {}; run `forget` first",
            existing.display()
        );
    }

    let path = store
        .enable_persistence(config)
        .context("failed to choose a configuration file location")?;
    store.apply_defaults();
    store
        .save()
        .with_context(|| format!("failed to write {}", path.display()))?;

    let id = store.unique_id().to_string();
    info!(path = %path.display(), "configuration file created");
    println!("created {} (id {id})", path.display());
    Ok(())
}

fn forget(store: &mut ConfigurationStore) -> anyhow::Result<()> {
    let Some(path) = store
        .detect_persistence()
        .context("failed to look for a configuration file")?
    else {
        println!("no configuration file found; nothing to forget");
        return Ok(());
    };

    store
        .disable_persistence()
        .with_context(|| format!("failed to remove {}", path.display()))?;
    println!("removed {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = cli.store(key_manager_from_env());
    store.init();

    match cli.command {
        Command::Show => show(&mut store),
        Command::Init => init(&mut store, cli.config),
        Command::Forget => forget(&mut store),
    }
}
