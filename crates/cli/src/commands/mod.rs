pub mod ask;
pub mod doctor;
pub mod onboard;
pub mod tools;

use std::path::{Path, PathBuf};

use toolloop_config::AppConfig;

/// The config file a command should read or write.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config file (or defaults) plus environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}").into())
}
