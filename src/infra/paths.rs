// src/infra/paths.rs — Config and data locations
//
// GOALFORGE_HOME overrides everything. Otherwise config lives in ~/.goalforge/
// and data in XDG_DATA_HOME/goalforge.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

fn goalforge_home() -> Option<PathBuf> {
    std::env::var_os("GOALFORGE_HOME").map(PathBuf::from)
}

/// Configuration directory: $GOALFORGE_HOME/ or ~/.goalforge/
pub fn config_dir() -> PathBuf {
    if let Some(home) = goalforge_home() {
        return home;
    }
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".goalforge"),
        None => PathBuf::from(".goalforge"),
    }
}

/// Data directory: $GOALFORGE_HOME/data/ or ~/.local/share/goalforge/
pub fn data_dir() -> PathBuf {
    if let Some(home) = goalforge_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "goalforge") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Goal summary history (one JSON object per line)
pub fn history_file_path() -> PathBuf {
    data_dir().join("goal-history.jsonl")
}
