//! Per-user file locations. `PROMPTBENCH_HOME` stands in for the home directory.

use std::path::PathBuf;

const APP_DIR: &str = ".promptbench";

fn base_dir() -> Option<PathBuf> {
    ["PROMPTBENCH_HOME", "HOME", "USERPROFILE"]
        .into_iter()
        .find_map(|name| std::env::var_os(name))
        .map(PathBuf::from)
}

/// `<home>/.env`, read after `./.env` when seeding the environment.
pub fn env_file() -> Option<PathBuf> {
    base_dir().map(|base| base.join(".env"))
}

pub fn config_file() -> Option<PathBuf> {
    base_dir().map(|base| base.join(APP_DIR).join("config.yaml"))
}

/// Falls back to a relative `.promptbench/logs` when no home directory is known.
pub fn log_dir() -> PathBuf {
    base_dir().unwrap_or_default().join(APP_DIR).join("logs")
}
