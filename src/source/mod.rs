use crate::Asset;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the hex id given to local files.
const LOCAL_ID_LEN: usize = 16;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_STRICT_FOLDER_ID_LEN: usize = 10;
const MAX_STRICT_FOLDER_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error, status: {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response format: {0}")]
    Format(String),
    #[error("invalid folder id: {0}")]
    InvalidFolderId(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Assets returned by a fetch, plus the opaque token that routes the results.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAssets {
    pub assets: Vec<Asset>,
    pub resume_token: Option<String>,
}

/// Lists the items to review for a folder.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_assets(&self, folder: &str) -> Result<FetchedAssets>;
}

/// Validate a remote folder id before it is sent anywhere.
///
/// Allows: alphanumeric, dash, underscore. Strict mode also bounds the length
/// to what drive-style folder ids look like.
pub fn validate_folder_id(folder: &str, strict: bool) -> Result<()> {
    if folder.is_empty() {
        return Err(SourceError::InvalidFolderId("empty folder id".to_string()));
    }

    for ch in folder.chars() {
        if !ch.is_ascii_alphanumeric() && !matches!(ch, '-' | '_') {
            return Err(SourceError::InvalidFolderId(format!(
                "invalid character '{}'",
                ch
            )));
        }
    }

    if strict && !(MIN_STRICT_FOLDER_ID_LEN..=MAX_STRICT_FOLDER_ID_LEN).contains(&folder.len()) {
        return Err(SourceError::InvalidFolderId(format!(
            "expected {}-{} characters, got {}",
            MIN_STRICT_FOLDER_ID_LEN,
            MAX_STRICT_FOLDER_ID_LEN,
            folder.len()
        )));
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    assets: Option<Vec<Asset>>,
    #[serde(default)]
    resume_url: Option<String>,
}

/// Parse the webhook's list response.
///
/// Expects `{"assets": [...], "resumeUrl": "..."}`. An empty resume URL is
/// treated as no token.
pub fn parse_fetch_response(body: &str) -> Result<FetchedAssets> {
    let response: FetchResponse =
        serde_json::from_str(body).map_err(|err| SourceError::Format(err.to_string()))?;
    let assets = response
        .assets
        .ok_or_else(|| SourceError::Format("missing assets array".to_string()))?;
    let resume_token = response.resume_url.filter(|url| !url.is_empty());
    Ok(FetchedAssets {
        assets,
        resume_token,
    })
}

/// Fetches the asset list by POSTing the folder id to a webhook.
pub struct HttpImageSource {
    http: reqwest::Client,
    fetch_url: String,
    validate: Option<bool>,
}

impl HttpImageSource {
    pub fn new(fetch_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            fetch_url: fetch_url.into(),
            validate: None,
        })
    }

    /// Validate folder ids before fetching; `strict` also checks length.
    pub fn with_validation(mut self, strict: bool) -> Self {
        self.validate = Some(strict);
        self
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch_assets(&self, folder: &str) -> Result<FetchedAssets> {
        if let Some(strict) = self.validate {
            validate_folder_id(folder, strict)?;
        }

        info!(url = %self.fetch_url, folder, "fetching asset list");
        let response = self
            .http
            .post(&self.fetch_url)
            .json(&serde_json::json!({ "folderId": folder }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let fetched = parse_fetch_response(&body)?;
        debug!(count = fetched.assets.len(), "asset list received");
        Ok(fetched)
    }
}

/// Reviews the image files of a local directory.
///
/// Each file's id is derived from a SHA-256 of its bytes, so the same image
/// present twice is only reviewed once.
#[derive(Debug, Default, Clone)]
pub struct DirectoryImageSource;

impl DirectoryImageSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageSource for DirectoryImageSource {
    async fn fetch_assets(&self, folder: &str) -> Result<FetchedAssets> {
        let dir = Path::new(folder);
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen = HashSet::new();
        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path).await?;
            let mut id = content_digest(&bytes);
            id.truncate(LOCAL_ID_LEN);
            if !seen.insert(id.clone()) {
                warn!(path = %path.display(), "skipping duplicate image content");
                continue;
            }

            let mut asset = Asset::with_id(id);
            asset.name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            asset.path = Some(path);
            assets.push(asset);
        }

        info!(folder, count = assets.len(), "listed local images");
        Ok(FetchedAssets {
            assets,
            resume_token: None,
        })
    }
}

/// Whether the path has an image extension we review.
fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Compute SHA-256 hash of content as lowercase hex.
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
