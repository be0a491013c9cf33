//! One-off media inspection of a remote file.

use std::path::PathBuf;

use tracing::debug;

use crate::config::MediaConfig;
use crate::download::Downloader;
use crate::error::MediaResult;
use crate::probe::{probe_media, MediaInfo};

/// Downloads a URL into a scratch directory and probes it.
#[derive(Debug, Clone)]
pub struct MediaInspector {
    downloader: Downloader,
    temp_dir: PathBuf,
}

impl MediaInspector {
    pub fn new(config: &MediaConfig) -> MediaResult<Self> {
        Ok(Self {
            downloader: Downloader::new(config.download_timeout)?,
            temp_dir: config.temp_dir.clone(),
        })
    }

    /// Probe the media at `url`. The downloaded copy is removed afterwards.
    pub async fn inspect(&self, url: &str) -> MediaResult<MediaInfo> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("inspect_")
            .tempdir_in(&self.temp_dir)?;

        let file = self.downloader.download(url, scratch.path(), "media").await?;
        let info = probe_media(&file).await?;
        debug!(url, duration = info.duration, format = %info.format_name, "Inspected media");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn inspector(dir: &TempDir) -> MediaInspector {
        MediaInspector::new(&MediaConfig {
            temp_dir: dir.path().join("scratch"),
            download_timeout: Duration::from_secs(5),
            ..MediaConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_inspect_rejects_non_http_url() {
        let dir = TempDir::new().unwrap();
        let err = inspector(&dir).inspect("ftp://example.com/a.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_inspect_cleans_up_after_failed_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = inspector(&dir)
            .inspect(&format!("{}/gone.mp4", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { .. }));

        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
