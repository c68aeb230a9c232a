//! Upload module
//!
//! The ingestion pipeline: request validation, size-bounded buffering,
//! content-type resolution and the single put into the object store.

use crate::s3::Credentials;
use bytes::{Bytes, BytesMut};
use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub mod ingest;
pub mod put_object;
pub mod request;

pub use ingest::{resolve_content_type, IngestService};
pub use put_object::{file_name, public_url, validate_object_key, R2Uploader};
pub use request::{DirectUpload, DirectUploadForm, UploadRequest, UploadRequestBody, UploadedFile};

/// Content type used when nothing better is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A payload grew past the configured ceiling
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("File size exceeds limit: {size} > {limit}")]
pub struct SizeLimitExceeded {
    /// Bytes declared or read so far
    pub size: u64,
    pub limit: u64,
}

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid request parameters: {0}")]
    Validation(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("File size exceeds limit: {size} > {limit}")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("Failed to download file, HTTP status {status}")]
    Upstream { status: u16 },

    #[error("Failed to download file: {0}")]
    Download(String),

    #[error("Failed to upload to R2: {0}")]
    UploadFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UploadError {
    /// HTTP status for this failure
    ///
    /// Size violations are reported as upload-stage failures (500), not 413.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::Validation(_) | UploadError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "validation",
            UploadError::InvalidKey(_) => "invalid_key",
            UploadError::SizeExceeded { .. } => "size_exceeded",
            UploadError::Upstream { .. } => "upstream",
            UploadError::Download(_) => "download",
            UploadError::UploadFailed(_) => "upload_failed",
            UploadError::IoError(_) => "io",
        }
    }
}

impl From<SizeLimitExceeded> for UploadError {
    fn from(e: SizeLimitExceeded) -> Self {
        UploadError::SizeExceeded {
            size: e.size,
            limit: e.limit,
        }
    }
}

/// Where a payload goes and with which credentials
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub endpoint: String,
    pub credentials: Credentials,
    pub custom_domain: Option<String>,
}

/// Upload result returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub public_url: String,
    pub size: u64,
    pub content_type: String,
    pub file_name: String,
}

/// Upload handler trait
#[async_trait::async_trait]
pub trait UploadHandler: Send + Sync {
    /// Put `payload` at `target` in a single all-or-nothing request
    async fn upload(
        &self,
        payload: Bytes,
        content_type: &str,
        target: &UploadTarget,
    ) -> Result<UploadResult, UploadError>;
}

/// In-memory buffer that refuses to grow past a byte limit
///
/// The chunk that would push the total over the limit is rejected without
/// being copied, so at most `limit` bytes are ever held.
#[derive(Debug)]
pub struct BoundedBuffer {
    buf: BytesMut,
    limit: u64,
}

impl BoundedBuffer {
    pub fn new(limit: u64) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Pre-allocate for a declared size, never beyond the limit
    pub fn with_size_hint(limit: u64, hint: Option<u64>) -> Self {
        let capacity = hint.unwrap_or(0).min(limit);
        Self {
            buf: BytesMut::with_capacity(usize::try_from(capacity).unwrap_or(0)),
            limit,
        }
    }

    /// Append a chunk
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), SizeLimitExceeded> {
        let size = self.buf.len() as u64 + chunk.len() as u64;
        if size > self.limit {
            return Err(SizeLimitExceeded {
                size,
                limit: self.limit,
            });
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Bytes buffered so far
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}
