//! Configuration
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.
//! `COMA_BACKEND_URL` and `COMA_DATA_DIR` override the file.

use crate::error::ComaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`ComaConfig::backend_url`]
pub const ENV_BACKEND_URL: &str = "COMA_BACKEND_URL";
/// Environment variable overriding [`ComaConfig::data_dir`]
pub const ENV_DATA_DIR: &str = "COMA_DATA_DIR";

/// Coma configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComaConfig {
    /// Base URL of the analysis backend
    pub backend_url: String,
    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Directory for the file-backed stores
    pub data_dir: PathBuf,
    /// Ask the backend to run its AI tagger on upload
    pub use_ai_tagger: bool,
    /// Capacity of the job event channel
    pub event_capacity: usize,
    /// How long a taxonomy check result is reused, in seconds
    pub taxonomy_cache_ttl_secs: u64,
}

impl ComaConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `ComaError::Config` on malformed TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ComaError> {
        toml::from_str(text).map_err(|e| ComaError::Config(e.to_string()))
    }

    /// Load a TOML file and apply environment overrides
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// `ComaError::Config` if the file exists but cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComaError> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ComaError::Config(format!("{}: {e}", path.display())));
            }
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from an environment lookup
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// With backend URL
    #[inline]
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// With AI tagger default
    #[inline]
    #[must_use]
    pub fn with_ai_tagger(mut self, enabled: bool) -> Self {
        self.use_ai_tagger = enabled;
        self
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Taxonomy check cache TTL
    #[inline]
    #[must_use]
    pub fn taxonomy_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.taxonomy_cache_ttl_secs)
    }
}

impl Default for ComaConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            poll_interval_ms: 2_000,
            request_timeout_secs: 30,
            data_dir: PathBuf::from(".coma"),
            use_ai_tagger: false,
            event_capacity: 256,
            taxonomy_cache_ttl_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ComaConfig::from_toml_str("poll_interval_ms = 500\nuse_ai_tagger = true\n").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.use_ai_tagger);
        assert_eq!(config.backend_url, "http://localhost:8000");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ComaConfig::from_toml_str("poll_interval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ComaError::Config(_)));
    }

    #[test]
    fn env_overrides_win() {
        let config = ComaConfig::new().with_env_overrides(|key| match key {
            ENV_BACKEND_URL => Some("http://backend:9000".to_string()),
            ENV_DATA_DIR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.backend_url, "http://backend:9000");
        assert_eq!(config.data_dir, PathBuf::from(".coma"));
    }

    #[test]
    fn load_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs = 5").unwrap();
        let config = ComaConfig::load(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        let dir = tempfile::tempdir().unwrap();
        assert!(ComaConfig::load(dir.path().join("absent.toml")).is_ok());
    }
}
