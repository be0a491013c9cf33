//! HTTP input downloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Downloads task inputs into a scratch directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vapi-media/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MediaError::internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download `url` into `dir` as `<prefix><n>.<ext>`, keeping the URL's extension.
    pub async fn download(&self, url: &str, dir: &Path, prefix: &str) -> MediaResult<PathBuf> {
        let parsed = Url::parse(url)
            .map_err(|e| MediaError::invalid_argument(format!("invalid URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MediaError::invalid_argument(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let target = dir.join(format!("{prefix}{}", extension_of(&parsed)));
        debug!(url, target = %target.display(), "Downloading input");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!("{url}: HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(&target).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::download_failed(format!("{url}: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed(format!("{url}: empty response body")));
        }

        info!(url, bytes = written, "Downloaded input");
        Ok(target)
    }
}

/// `.ext` of the last path segment, or empty.
fn extension_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extension_of() {
        let ext = |s: &str| extension_of(&Url::parse(s).unwrap());
        assert_eq!(ext("https://cdn.example.com/a/clip.MP4?sig=1"), ".mp4");
        assert_eq!(ext("https://cdn.example.com/subs.srt"), ".srt");
        assert_eq!(ext("https://cdn.example.com/download"), "");
        assert_eq!(ext("https://cdn.example.com/"), "");
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/in.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake video".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/media/in.mp4", server.uri());

        let file = downloader.download(&url, dir.path(), "video").await.unwrap();
        assert_eq!(file.file_name().unwrap(), "video.mp4");
        assert_eq!(tokio::fs::read(&file).await.unwrap(), b"fake video");
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(Duration::from_secs(5)).unwrap();
        let err = downloader
            .download(&format!("{}/missing.mp4", server.uri()), dir.path(), "video")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_download_rejects_non_http() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(Duration::from_secs(5)).unwrap();
        let err = downloader
            .download("file:///etc/passwd", dir.path(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }
}
