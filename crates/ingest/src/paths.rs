use std::path::PathBuf;

pub fn default_codex_home() -> PathBuf {
    home_dir_for("CODEX_HOME", ".codex")
}

pub fn default_openclaw_home() -> PathBuf {
    home_dir_for("OPENCLAW_HOME", ".openclaw")
}

fn home_dir_for(env_var: &str, dir_name: &str) -> PathBuf {
    if let Ok(path) = std::env::var(env_var) {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(dir_name);
    }
    PathBuf::from(dir_name)
}
