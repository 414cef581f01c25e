mod args;
mod config;
mod dirs;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracker_app::{AppPaths, AppState, ensure_app_data_dir};

use crate::args::{Cli, Command};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let loaded = config::load_or_create(cli.config.as_deref())?;
    if loaded.created {
        tracing::info!(path = %loaded.file.display(), "created default config");
    }

    let db_path = match cli.db.clone().or_else(|| loaded.config.db_path.clone()) {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create db dir {}", parent.display()))?;
            }
            path
        }
        None => default_db_path()?,
    };

    let state = AppState::new(loaded.config.to_app_config(db_path));
    state.setup_db()?;

    match cli.command {
        Command::Ingest => print_json(&state.services.ingest.run()?),
        Command::Dashboard => {
            let dashboard = state.services.analytics.dashboard(None, Utc::now())?;
            print_json(&dashboard.value)
        }
        Command::Sessions { limit } => print_json(&state.services.analytics.sessions(limit)?),
    }
}

fn default_db_path() -> Result<PathBuf> {
    let data_dir = dirs::resolve_data_dir()?;
    if data_dir.matched_existing {
        tracing::debug!(dir = %data_dir.dir.display(), "using existing data dir");
    } else {
        tracing::info!(dir = %data_dir.dir.display(), "using new data dir");
    }
    let paths = AppPaths::new(data_dir.dir);
    ensure_app_data_dir(&paths)?;
    Ok(paths.db_path)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("encode output")?;
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the JSON output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}
