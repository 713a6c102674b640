use crate::gesture::DEFAULT_DRAG_THRESHOLD;
use crate::prefetch::{DEFAULT_BUFFER_SIZE, DEFAULT_RETAIN_SLACK};
use crate::sink::SubmissionFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "SWIPE_REVIEW_CONFIG";

const DEFAULT_JOURNAL_PATH: &str = ".swipe-review/journal.db";
const DEFAULT_LOG_FILE: &str = ".swipe-review/swipe-review.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Knobs of the review loop itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Items prepared ahead of the current one.
    pub buffer_size: usize,
    /// Extra distance past the buffer before a prepared item is released.
    pub retain_slack: usize,
    pub drag_threshold: f64,
    pub submit_filter: SubmissionFilter,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            retain_slack: DEFAULT_RETAIN_SLACK,
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            submit_filter: SubmissionFilter::default(),
        }
    }
}

/// Application configuration, loaded from TOML and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Webhook that lists the assets of a folder.
    pub fetch_url: Option<String>,
    /// Where results go when the resume token is not a URL.
    pub submit_url: Option<String>,
    /// Check remote folder ids before fetching; `strict` also checks length.
    pub validate_folder_id: FolderIdValidation,
    pub journal_path: PathBuf,
    pub log_file: PathBuf,
    pub review: ReviewSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderIdValidation {
    Off,
    #[default]
    Charset,
    Strict,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch_url: None,
            submit_url: None,
            validate_folder_id: FolderIdValidation::default(),
            journal_path: PathBuf::from(DEFAULT_JOURNAL_PATH),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            review: ReviewSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.review.drag_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "review.drag_threshold must be a non-negative number, got {threshold}"
            )));
        }
        for (key, url) in [
            ("fetch_url", &self.fetch_url),
            ("submit_url", &self.submit_url),
        ] {
            if let Some(url) = url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.review.buffer_size, 3);
        assert_eq!(config.review.drag_threshold, 100.0);
        assert_eq!(config.review.submit_filter, SubmissionFilter::Rejected);
    }

    #[test]
    fn partial_review_section_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            fetch_url = "https://hooks.example/list"
            validate_folder_id = "strict"

            [review]
            buffer_size = 5
            submit_filter = "decided"
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch_url.as_deref(), Some("https://hooks.example/list"));
        assert_eq!(config.validate_folder_id, FolderIdValidation::Strict);
        assert_eq!(config.review.buffer_size, 5);
        assert_eq!(config.review.retain_slack, 3);
        assert_eq!(config.review.submit_filter, SubmissionFilter::Decided);
    }

    #[test]
    fn rejects_negative_threshold() {
        let err = AppConfig::from_toml("[review]\ndrag_threshold = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = AppConfig::from_toml(r#"submit_url = "ftp://x""#).unwrap_err();
        assert!(err.to_string().contains("submit_url"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }
}
