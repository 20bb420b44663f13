//! Download request options and results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Proxy used for a single download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL (http, https or socks5)
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Options controlling a ranked-fallback download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Caller's reference id; the output filename is derived from it
    pub reference_id: String,

    /// Replace an existing file at the final path
    pub overwrite: bool,

    /// Maximum accepted body size in megabytes
    pub max_file_size_mb: u64,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Run structural PDF validation before committing
    pub validate_pdf: bool,

    /// Target directory, created if missing
    pub directory: PathBuf,

    pub proxy: Option<ProxyConfig>,
}

impl DownloadOptions {
    /// Create options with defaults: 100 MB, 120 s, validation on, no overwrite
    pub fn new(reference_id: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            reference_id: reference_id.into(),
            overwrite: false,
            max_file_size_mb: 100,
            timeout_secs: 120,
            validate_pdf: true,
            directory: directory.into(),
            proxy: None,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_mb = mb;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn validate_pdf(mut self, validate: bool) -> Self {
        self.validate_pdf = validate;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Size limit in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Quality grade assigned by structural validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfQuality {
    Low,
    Medium,
    High,
}

/// Outcome of structural PDF validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub file_size: u64,
    pub page_count: Option<u32>,
    pub has_text: bool,
    pub quality: PdfQuality,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// An invalid result carrying a single error
    pub fn invalid(file_size: u64, error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            file_size,
            page_count: None,
            has_text: false,
            quality: PdfQuality::Low,
            errors: vec![error.into()],
        }
    }
}

/// Result of a download operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,

    pub file_path: Option<PathBuf>,

    /// Size of the committed file in bytes
    pub file_size: u64,

    pub content_type: Option<String>,

    /// Wall-clock time in milliseconds, including the search
    pub download_time_ms: u64,

    pub error: Option<String>,

    /// Source name of the candidate that produced the file
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl DownloadResult {
    /// Create a successful download result
    pub fn success(file_path: PathBuf, file_size: u64, source: impl Into<String>) -> Self {
        Self {
            success: true,
            file_path: Some(file_path),
            file_size,
            content_type: Some("application/pdf".to_string()),
            download_time_ms: 0,
            error: None,
            source: Some(source.into()),
            validation: None,
        }
    }

    /// A file that was already on disk and left untouched
    pub fn existing(file_path: PathBuf, file_size: u64) -> Self {
        Self {
            success: true,
            file_path: Some(file_path),
            file_size,
            content_type: Some("application/pdf".to_string()),
            download_time_ms: 0,
            error: None,
            source: None,
            validation: None,
        }
    }

    pub fn content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn download_time_ms(mut self, ms: u64) -> Self {
        self.download_time_ms = ms;
        self
    }

    pub fn validation(mut self, validation: Option<ValidationResult>) -> Self {
        self.validation = validation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_option_defaults() {
        let options = DownloadOptions::new("ref-1", "/tmp/out");
        assert!(!options.overwrite);
        assert!(options.validate_pdf);
        assert_eq!(options.timeout_secs, 120);
        assert_eq!(options.max_file_size_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_quality_serializes_lowercase() {
        let json = serde_json::to_string(&PdfQuality::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
