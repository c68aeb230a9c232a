//! Bounded Fetcher
//!
//! Downloads a remote file into memory without ever holding more than the
//! configured maximum.
//!
//! The declared `Content-Length` (from a HEAD probe and from the GET response)
//! is used to fail early, but the limit is enforced on the bytes actually
//! received, so a server that lies about the length, or sends none, is caught
//! as well.

use crate::metrics;
use crate::upload::{BoundedBuffer, SizeLimitExceeded, UploadError, DEFAULT_CONTENT_TYPE};
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    SizeExceeded(#[from] SizeLimitExceeded),

    #[error("Failed to download file, HTTP status {status}")]
    Upstream { status: u16 },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<FetchError> for UploadError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::SizeExceeded(e) => e.into(),
            FetchError::Upstream { status } => UploadError::Upstream { status },
            FetchError::Request(e) => UploadError::Download(e.to_string()),
            FetchError::ConfigError(msg) => UploadError::Download(msg),
        }
    }
}

/// A downloaded file
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Bytes,
    pub content_type: String,
    pub size: u64,
}

/// Size-bounded HTTP downloader
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    client: reqwest::Client,
    max_file_size: u64,
}

impl BoundedFetcher {
    /// Create a fetcher with its own connection pool
    ///
    /// `timeout` bounds connecting and each wait for data, not the whole
    /// transfer, so a slow but steady download under the limit completes.
    pub fn new(max_file_size: u64, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("r2-uploader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::ConfigError(e.to_string()))?;

        Ok(Self::with_client(client, max_file_size))
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client, max_file_size: u64) -> Self {
        Self {
            client,
            max_file_size,
        }
    }

    /// Configured byte ceiling
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Download `url` into memory
    ///
    /// 1. HEAD probe: a declared length above the limit fails before any body
    ///    is transferred.
    /// 2. GET: non-success status fails with [`FetchError::Upstream`].
    /// 3. The body is streamed into a [`BoundedBuffer`]; the first chunk that
    ///    pushes the total past the limit aborts the download.
    #[tracing::instrument(
        name = "fetch",
        skip(self),
        fields(
            fetch.bytes = tracing::field::Empty,
            fetch.content_type = tracing::field::Empty
        ),
        err
    )]
    pub async fn fetch(&self, url: &str) -> Result<FetchedFile, FetchError> {
        let result = self.fetch_inner(url).await;
        match &result {
            Ok(file) => {
                let span = tracing::Span::current();
                span.record("fetch.bytes", file.size);
                span.record("fetch.content_type", file.content_type.as_str());
                metrics::record_fetch_success(file.size);
                info!(bytes = file.size, content_type = %file.content_type, "Fetched remote file");
            }
            Err(_) => metrics::record_fetch_failure(),
        }
        result
    }

    async fn fetch_inner(&self, url: &str) -> Result<FetchedFile, FetchError> {
        let head = self.client.head(url).send().await?;
        let head_declared = declared_length(head.headers());
        self.check_declared(head_declared)?;

        let head_content_type = if head.status().is_success() {
            content_type_of(head.headers())
        } else {
            debug!(status = head.status().as_u16(), "HEAD probe was not successful");
            None
        };

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Remote file request failed");
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let get_declared = declared_length(response.headers());
        self.check_declared(get_declared)?;

        let content_type = head_content_type
            .or_else(|| content_type_of(response.headers()))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut buffer = BoundedBuffer::with_size_hint(self.max_file_size, get_declared);
        while let Some(chunk) = response.chunk().await? {
            buffer.push(&chunk)?;
        }

        let size = buffer.len();
        Ok(FetchedFile {
            bytes: buffer.into_bytes(),
            content_type,
            size,
        })
    }

    fn check_declared(&self, declared: Option<u64>) -> Result<(), SizeLimitExceeded> {
        match declared {
            Some(size) if size > self.max_file_size => Err(SizeLimitExceeded {
                size,
                limit: self.max_file_size,
            }),
            _ => Ok(()),
        }
    }
}

/// Parse the `Content-Length` header.
///
/// Read from the header itself because a HEAD response has no body to size.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn content_type_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
