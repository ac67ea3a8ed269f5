pub mod init;
pub mod serve;
pub mod status;
pub mod sync;

use nexus_config::AppConfig;
use std::path::{Path, PathBuf};

/// Config file location: `--config` if given, else `~/.nexus/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the layered configuration (file, `.env`, environment).
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with(&path).map_err(|e| format!("Failed to load config: {e}").into())
}
