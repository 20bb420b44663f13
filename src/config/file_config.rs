//! Configuration file discovery and creation.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! source_timeout_secs = 30
//! max_results = 20
//!
//! [downloads]
//! directory = "./downloads"
//! max_file_size_mb = 100
//! timeout_secs = 120
//! validate_pdf = true
//!
//! [sources]
//! enabled = ["unpaywall", "openalex", "arxiv"]
//! disabled = []
//! unpaywall_email = "you@example.com"
//! core_api_key = "your-core-api-key"
//!
//! [scoring.reputation]
//! unpaywall = 0.15
//! "semantic scholar" = 0.08
//!
//! [proxy]
//! url = "socks5://127.0.0.1:1080"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

const CONFIG_DIR_NAME: &str = "pdf-finder";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_FILE_NAME: &str = "pdf-finder.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Per-user config location, e.g. `~/.config/pdf-finder/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Find a config file: `./pdf-finder.toml` first, then the per-user location
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|p| p.is_file())
}

/// Write the default configuration to `path`, refusing to clobber an existing file
pub fn write_default_config(path: &Path) -> Result<(), ConfigFileError> {
    if path.exists() {
        return Err(ConfigFileError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // Keys come from the environment at runtime; never persist them
    let mut config = Config::default();
    config.sources.core_api_key = None;
    config.sources.semantic_scholar_api_key = None;

    std::fs::write(path, config.to_toml_string()?)?;
    Ok(())
}
