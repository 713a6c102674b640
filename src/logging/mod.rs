use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to open log file '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Send `tracing` output to `log_path`.
///
/// The terminal belongs to the review UI, so logs never go to stdout or
/// stderr. The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_file_logging(log_path: &Path) -> Result<(), LoggingError> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| LoggingError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|source| LoggingError::Open {
            path: log_path.display().to_string(),
            source,
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log = %log_path.display(),
        "swipe-review started"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("nested/logs/review.log");

        // Another test may already own the global subscriber; the file is
        // still created before installation is attempted.
        let _ = init_file_logging(&log_path);
        assert!(log_path.exists());
    }
}
