use crate::Asset;
use crate::source::content_digest;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const PREVIEW_TIMEOUT: Duration = Duration::from_secs(20);
const DIGEST_PREFIX_LEN: usize = 12;

/// Prepares the presentation of an item ahead of display.
///
/// A handle owns whatever the presentation acquired; it is given back
/// through [`AssetPreparer::release`] when the item leaves the window.
#[async_trait]
pub trait AssetPreparer: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Prepare the asset. The error is a human-readable reason shown on
    /// the card placeholder.
    async fn prepare(&self, asset: &Asset) -> Result<Self::Handle, String>;

    fn release(&self, handle: Self::Handle);
}

/// What the terminal shows for a prepared card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPreview {
    pub id: String,
    pub title: String,
    pub location: String,
    pub byte_len: usize,
    pub content_type: Option<String>,
    pub digest: String,
}

/// Loads image bytes from disk or the asset's thumbnail URL and summarizes
/// them for a text card.
pub struct TerminalPreparer {
    http: reqwest::Client,
}

impl TerminalPreparer {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(PREVIEW_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    async fn fetch_remote(&self, url: &str) -> Result<(Vec<u8>, Option<String>), String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error, status: {}", status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| format!("failed to read body: {err}"))?;
        Ok((bytes.to_vec(), content_type))
    }
}

#[async_trait]
impl AssetPreparer for TerminalPreparer {
    type Handle = CardPreview;

    async fn prepare(&self, asset: &Asset) -> Result<CardPreview, String> {
        let (location, bytes, content_type) = if let Some(path) = &asset.path {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
            let content_type = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(content_type_for_extension)
                .map(str::to_string);
            (path.display().to_string(), bytes, content_type)
        } else if let Some(url) = asset.thumb_url.as_deref().or(asset.embed_url.as_deref()) {
            let (bytes, content_type) = self.fetch_remote(url).await?;
            (url.to_string(), bytes, content_type)
        } else {
            return Err("asset has no path or URL".to_string());
        };

        let mut digest = content_digest(&bytes);
        digest.truncate(DIGEST_PREFIX_LEN);
        debug!(id = %asset.id, bytes = bytes.len(), "card prepared");

        Ok(CardPreview {
            id: asset.id.clone(),
            title: asset.label().to_string(),
            location,
            byte_len: bytes.len(),
            content_type,
            digest,
        })
    }

    fn release(&self, handle: CardPreview) {
        debug!(id = %handle.id, "card released");
    }
}

fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepares_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.PNG");
        std::fs::write(&path, b"not really a png").unwrap();

        let mut asset = Asset::with_id("abc");
        asset.name = Some("cat.PNG".to_string());
        asset.path = Some(path);

        let preparer = TerminalPreparer::new().unwrap();
        let card = preparer.prepare(&asset).await.unwrap();
        assert_eq!(card.title, "cat.PNG");
        assert_eq!(card.byte_len, 16);
        assert_eq!(card.content_type.as_deref(), Some("image/png"));
        assert_eq!(card.digest.len(), DIGEST_PREFIX_LEN);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let mut asset = Asset::with_id("gone");
        asset.path = Some("/definitely/not/here.png".into());

        let preparer = TerminalPreparer::new().unwrap();
        let err = preparer.prepare(&asset).await.unwrap_err();
        assert!(err.contains("cannot read"));
    }

    #[tokio::test]
    async fn asset_without_location_is_unavailable() {
        let preparer = TerminalPreparer::new().unwrap();
        let err = preparer.prepare(&Asset::with_id("x")).await.unwrap_err();
        assert_eq!(err, "asset has no path or URL");
    }
}
