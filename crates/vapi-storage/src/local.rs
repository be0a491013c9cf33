//! Filesystem-backed storage.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for stored artifacts
    pub root: PathBuf,
    /// Public URL prefix mapped onto `root`
    pub media_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage"),
            media_url: "http://localhost:8080/storage".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    ///
    /// `MEDIA_URL` falls back to `{BASE_URL}/storage`, and `BASE_URL` to the
    /// local API address.
    pub fn from_env() -> Self {
        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| {
            let port = std::env::var("API_PORT").unwrap_or_else(|_| "8080".to_string());
            format!("http://localhost:{port}")
        });
        Self {
            root: std::env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
            media_url: std::env::var("MEDIA_URL")
                .unwrap_or_else(|_| format!("{}/storage", base_url.trim_end_matches('/'))),
        }
    }
}

/// Local storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    media_url: String,
}

impl LocalStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            root: config.root,
            media_url: config.media_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `source` into `<root>/YYYY/MM/DD/<uuid><ext>` and return its public URL.
    pub async fn store_file(&self, source: &Path) -> StorageResult<String> {
        if !tokio::fs::try_exists(source).await? {
            return Err(StorageError::not_found(source.display().to_string()));
        }

        let relative = dated_name(source);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(source, &target).await.map_err(|e| {
            StorageError::store_failed(format!("{} -> {}: {e}", source.display(), target.display()))
        })?;
        debug!(source = %source.display(), target = %target.display(), "Stored file");

        self.file_url(&target).await
    }

    /// Public URL of a file already inside the storage root.
    pub async fn file_url(&self, path: &Path) -> StorageResult<String> {
        let relative = self.relative_to_root(path)?;
        if !tokio::fs::try_exists(self.root.join(&relative)).await? {
            return Err(StorageError::not_found(path.display().to_string()));
        }
        Ok(self.url_for(&relative))
    }

    /// Path of `path` relative to the root, rejecting anything that escapes it.
    fn relative_to_root(&self, path: &Path) -> StorageResult<PathBuf> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::outside_root(path.display().to_string()))?;
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || relative.as_os_str().is_empty() {
            return Err(StorageError::outside_root(path.display().to_string()));
        }
        Ok(relative.to_path_buf())
    }

    fn url_for(&self, relative: &Path) -> String {
        let encoded: Vec<String> = relative
            .components()
            .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
            .collect();
        format!("{}/{}", self.media_url, encoded.join("/"))
    }
}

/// `YYYY/MM/DD/<uuid><ext>` for a new artifact.
fn dated_name(source: &Path) -> PathBuf {
    let mut name = Uuid::new_v4().to_string();
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    PathBuf::from(Utc::now().format("%Y/%m/%d").to_string()).join(name)
}
