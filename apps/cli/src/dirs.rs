use std::path::PathBuf;

use anyhow::{Context, Result};
use tracker_app::startup::DB_FILE_NAME;

const DATA_DIR_NAME: &str = "usage-tracker";

#[derive(Debug, Clone)]
pub struct DataDirResolution {
    pub dir: PathBuf,
    pub matched_existing: bool,
}

/// `$XDG_DATA_HOME/usage-tracker`, or `~/.local/share/usage-tracker`.
pub fn resolve_data_dir() -> Result<DataDirResolution> {
    let base = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").context("resolve HOME")?;
            PathBuf::from(home).join(".local").join("share")
        }
    };
    let dir = base.join(DATA_DIR_NAME);
    let matched_existing = dir.join(DB_FILE_NAME).exists();
    Ok(DataDirResolution {
        dir,
        matched_existing,
    })
}
