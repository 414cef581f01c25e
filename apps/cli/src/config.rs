use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracker_app::AppConfig;
use tracker_core::DashboardLimits;

const CONFIG_DIR_NAME: &str = "usage-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// An empty path turns the source off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openclaw_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codex_root: Option<PathBuf>,
    pub retention_days: u32,
    pub cache_ttl_ms: u64,
    pub limits: DashboardLimits,
}

impl Default for CliConfig {
    fn default() -> Self {
        let defaults = AppConfig::new(PathBuf::new());
        Self {
            db_path: None,
            openclaw_root: defaults.openclaw_root,
            codex_root: defaults.codex_root,
            retention_days: defaults.retention_days,
            cache_ttl_ms: defaults.cache_ttl_ms,
            limits: defaults.limits,
        }
    }
}

impl CliConfig {
    pub fn to_app_config(&self, db_path: PathBuf) -> AppConfig {
        AppConfig {
            db_path,
            openclaw_root: enabled_root(self.openclaw_root.as_deref()),
            codex_root: enabled_root(self.codex_root.as_deref()),
            retention_days: self.retention_days,
            cache_ttl_ms: self.cache_ttl_ms,
            limits: self.limits,
        }
    }
}

fn enabled_root(root: Option<&Path>) -> Option<PathBuf> {
    root.filter(|root| !root.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Reads `file` (or the default location), writing defaults on first run.
pub fn load_or_create(file: Option<&Path>) -> Result<ConfigLoad> {
    let file = match file {
        Some(file) => file.to_path_buf(),
        None => config_dir()?.join(CONFIG_FILE_NAME),
    };

    if file.exists() {
        let contents = fs::read_to_string(&file)
            .with_context(|| format!("read config {}", file.display()))?;
        let config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("parse config {}", file.display()))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create config dir {}", dir.display()))?;
    }
    let config = CliConfig::default();
    let contents = toml::to_string_pretty(&config).context("serialize config")?;
    fs::write(&file, contents).with_context(|| format!("write config {}", file.display()))?;

    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir).join(CONFIG_DIR_NAME));
    }
    let home = std::env::var("HOME").context("resolve HOME")?;
    Ok(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_app::config::DEFAULT_CACHE_TTL_MS;

    #[test]
    fn creates_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("nested/config.toml");

        let created = load_or_create(Some(&file)).expect("create");
        assert!(created.created);
        assert!(file.exists());
        assert_eq!(created.config.retention_days, 90);

        let loaded = load_or_create(Some(&file)).expect("load");
        assert!(!loaded.created);
        assert_eq!(loaded.config, created.config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("config.toml");
        fs::write(
            &file,
            "retention_days = 30\ncodex_root = \"/data/codex\"\n\n[limits]\ntrend_days = 7\ntop_models = 3\nrecent_sessions = 5\n",
        )
        .expect("write config");

        let loaded = load_or_create(Some(&file)).expect("load");
        assert_eq!(loaded.config.retention_days, 30);
        assert_eq!(loaded.config.cache_ttl_ms, DEFAULT_CACHE_TTL_MS);
        assert_eq!(loaded.config.limits.top_models, 3);

        let app = loaded.config.to_app_config(PathBuf::from("/tmp/db.sqlite"));
        assert_eq!(app.codex_root, Some(PathBuf::from("/data/codex")));
        assert_eq!(app.retention_days, 30);
    }

    #[test]
    fn empty_root_disables_the_source() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("config.toml");
        fs::write(&file, "openclaw_root = \"\"\ncodex_root = \"/data/codex\"\n")
            .expect("write config");

        let loaded = load_or_create(Some(&file)).expect("load");
        let app = loaded.config.to_app_config(PathBuf::from("/tmp/db.sqlite"));
        assert_eq!(app.openclaw_root, None);
        assert_eq!(app.codex_root, Some(PathBuf::from("/data/codex")));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("config.toml");
        fs::write(&file, "retention_days = \"soon\"").expect("write config");
        assert!(load_or_create(Some(&file)).is_err());
    }
}
