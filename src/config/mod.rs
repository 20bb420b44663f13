//! Configuration management.
//!
//! Settings are layered: built-in defaults, then the TOML file, then
//! `PDF_FINDER_*` environment variables (`__` separates sections, e.g.
//! `PDF_FINDER_DOWNLOADS__MAX_FILE_SIZE_MB=50`).

mod file_config;

pub use file_config::{default_config_path, find_config_file, write_default_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{ProxyConfig, DEFAULT_MAX_RESULTS, DEFAULT_SOURCE_TIMEOUT_SECS};
use crate::search::ScoringConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PDF_FINDER";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Catalog adapters, contact emails and API keys
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Source reputation table
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Proxy used for PDF downloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

impl Config {
    /// Copy of the configuration with API keys masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "********".to_string());
        let mut config = self.clone();
        config.sources.core_api_key = mask(&self.sources.core_api_key);
        config.sources.semantic_scholar_api_key = mask(&self.sources.semantic_scholar_api_key);
        if let Some(proxy) = config.proxy.as_mut() {
            proxy.password = proxy.password.as_ref().map(|_| "********".to_string());
        }
        config
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Per-source timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,

    /// Maximum ranked candidates returned
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout(),
            max_results: default_max_results(),
        }
    }
}

fn default_source_timeout() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_SECS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default download directory
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,

    /// Maximum file size for downloads (in MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Whether downloaded files are parsed and checked
    #[serde(default = "default_true")]
    pub validate_pdf: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
            max_file_size_mb: default_max_file_size(),
            timeout_secs: default_download_timeout(),
            validate_pdf: true,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_file_size() -> u64 {
    100
}

fn default_download_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// Catalog adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Only use these source ids (empty means all)
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Never use these source ids
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Contact email Unpaywall requires on every request
    #[serde(default = "env_unpaywall_email")]
    pub unpaywall_email: Option<String>,

    /// Contact email for the OpenAlex polite pool
    #[serde(default = "env_openalex_email")]
    pub openalex_email: Option<String>,

    /// Contact email for the CrossRef polite pool
    #[serde(default = "env_crossref_email")]
    pub crossref_email: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default = "env_semantic_scholar_api_key")]
    pub semantic_scholar_api_key: Option<String>,

    /// CORE API key; CORE is skipped without one
    #[serde(default = "env_core_api_key")]
    pub core_api_key: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            disabled: Vec::new(),
            unpaywall_email: env_unpaywall_email(),
            openalex_email: env_openalex_email(),
            crossref_email: env_crossref_email(),
            semantic_scholar_api_key: env_semantic_scholar_api_key(),
            core_api_key: env_core_api_key(),
        }
    }
}

impl SourcesConfig {
    /// Whether the source id passes the enabled and disabled lists
    pub fn is_enabled(&self, id: &str) -> bool {
        let listed = |list: &[String]| list.iter().any(|s| s.trim().eq_ignore_ascii_case(id));

        if !self.enabled.is_empty() && !listed(&self.enabled) {
            return false;
        }
        !listed(&self.disabled)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_unpaywall_email() -> Option<String> {
    non_empty_env("UNPAYWALL_EMAIL")
}

fn env_openalex_email() -> Option<String> {
    non_empty_env("OPENALEX_EMAIL")
}

fn env_crossref_email() -> Option<String> {
    non_empty_env("CROSSREF_EMAIL")
}

fn env_semantic_scholar_api_key() -> Option<String> {
    non_empty_env("SEMANTIC_SCHOLAR_API_KEY")
}

fn env_core_api_key() -> Option<String> {
    non_empty_env("CORE_API_KEY")
}

/// Load configuration, layering an explicit or discovered file and the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using config file {}", found.display());
                builder = builder.add_source(config::File::from(found.as_path()).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("sources.enabled")
                .with_list_parse_key("sources.disabled"),
        )
        .build()?;

    settings.try_deserialize()
}

/// Get the configuration from the default locations, falling back to defaults
pub fn get_config() -> Config {
    load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable configuration: {}", e);
        Config::default()
    })
}
