//! Pipeline configuration.
//!
//! Supports YAML configuration with precedence: CLI > ENV > file > defaults.
//! The CLI layer is applied by the binary; this module covers the rest.

use crate::error::{Error, Result};
use crate::output::DEFAULT_JPEG_QUALITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`PipelineConfig::workers`].
pub const ENV_WORKERS: &str = "TRUENO_FIG_WORKERS";
/// Environment variable overriding [`PipelineConfig::timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "TRUENO_FIG_TIMEOUT_MS";
/// Environment variable overriding [`PipelineConfig::jpeg_quality`].
pub const ENV_JPEG_QUALITY: &str = "TRUENO_FIG_JPEG_QUALITY";

/// Render pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker threads for loads and panel renders.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Whole-invocation deadline in milliseconds; none by default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// JPEG encoder quality, 1..=100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Write `<stem>.meta.json` next to the first exported file.
    #[serde(default = "default_write_metadata")]
    pub write_metadata: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(8))
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}
fn default_write_metadata() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_ms: None,
            jpeg_quality: default_jpeg_quality(),
            write_metadata: default_write_metadata(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            Error::Config(format!("line {line}: {e}"))
        })?;
        config.validate()
    }

    /// Overlay `TRUENO_FIG_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but malformed.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but malformed.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key}: cannot parse '{value}'")))
        }
        if let Some(v) = lookup(ENV_WORKERS) {
            self.workers = parse_var(ENV_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = Some(parse_var(ENV_TIMEOUT_MS, &v)?);
        }
        if let Some(v) = lookup(ENV_JPEG_QUALITY) {
            self.jpeg_quality = parse_var(ENV_JPEG_QUALITY, &v)?;
        }
        self.validate()
    }

    /// Reject out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field.
    pub fn validate(self) -> Result<Self> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(self)
    }

    /// The invocation deadline, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::new();
        assert!(config.workers >= 1);
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.timeout(), None);
        assert!(config.write_metadata);
    }

    #[test]
    fn test_config_parse_full() {
        let yaml = r"
workers: 3
timeout_ms: 2500
jpeg_quality: 80
write_metadata: false
";
        let config = PipelineConfig::parse(yaml).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.jpeg_quality, 80);
        assert!(!config.write_metadata);
    }

    #[test]
    fn test_config_parse_error_includes_line() {
        let yaml = "\nworkers: 2\njpeg_quality: lots\n";
        let err = PipelineConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn test_config_rejects_zero_workers() {
        assert!(PipelineConfig::parse("workers: 0").is_err());
        assert!(PipelineConfig::parse("jpeg_quality: 0").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([(ENV_WORKERS, "2"), (ENV_TIMEOUT_MS, " 100 ")]);
        let config = PipelineConfig::parse("workers: 6\njpeg_quality: 70")
            .unwrap()
            .apply_env_from(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.timeout_ms, Some(100));
        assert_eq!(config.jpeg_quality, 70);
    }

    #[test]
    fn test_malformed_env_is_error() {
        let err = PipelineConfig::new()
            .apply_env_from(|k| (k == ENV_JPEG_QUALITY).then(|| "high".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineConfig::load(dir.path().join("nope.yaml")).is_err());
    }
}
