//! Image downloads to deterministic paths
//!
//! Fetching is behind [`ImageFetcher`] so the write path can be exercised
//! without the network. Downloads are never retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::HttpConfig;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the full body of `url`. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed fetcher sharing one connection pool
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        Ok(body.to_vec())
    }
}

/// Fetches one URL and writes it to one path
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn ImageFetcher>,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Download `url` into `dest`, creating parent directories as needed.
    ///
    /// Bytes land in a `.part` sibling first and are renamed into place, so
    /// `dest` only ever holds a complete body. Returns the number of bytes
    /// written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let bytes = self.fetcher.fetch(url).await?;

        let write_error = |source| DownloadError::Write {
            path: dest.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let partial = partial_path(dest);
        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_error(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, dest).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_error(e));
        }

        debug!("Saved {} bytes from {} to {}", bytes.len(), url, dest.display());
        Ok(bytes.len() as u64)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
