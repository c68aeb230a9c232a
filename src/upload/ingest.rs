//! Ingestion orchestrator
//!
//! Ties the fetcher and the uploader together for the two upload flows.

use super::{
    BoundedBuffer, DirectUpload, UploadError, UploadHandler, UploadRequest, UploadResult,
    DEFAULT_CONTENT_TYPE,
};
use crate::fetch::BoundedFetcher;
use crate::metrics;
use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::info;

/// Content type for a direct upload
///
/// A non-blank declared type wins; otherwise it is guessed from the file
/// extension.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(file_name).first_raw().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

pub struct IngestService {
    fetcher: BoundedFetcher,
    uploader: Arc<dyn UploadHandler>,
}

impl IngestService {
    pub fn new(fetcher: BoundedFetcher, uploader: Arc<dyn UploadHandler>) -> Self {
        Self { fetcher, uploader }
    }

    pub fn max_file_size(&self) -> u64 {
        self.fetcher.max_file_size()
    }

    /// Drain a body stream into memory under the file size limit
    ///
    /// Stops reading at the first chunk past the limit.
    pub async fn read_bounded<S, E>(&self, stream: S) -> Result<Bytes, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        pin_mut!(stream);
        let mut buffer = BoundedBuffer::new(self.max_file_size());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| UploadError::Validation(format!("failed to read file: {}", e)))?;
            buffer.push(&chunk)?;
        }
        Ok(buffer.into_bytes())
    }

    /// Read the file part of a direct upload
    ///
    /// Like [`read_bounded`](Self::read_bounded), but a rejection counts as a
    /// failed direct upload since [`upload_direct`](Self::upload_direct) never
    /// runs for it.
    pub async fn read_direct_file<S, E>(&self, stream: S) -> Result<Bytes, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let result = self.read_bounded(stream).await;
        if let Err(e) = &result {
            record_failure("direct", e);
        }
        result
    }

    /// Fetch a remote file and store it
    #[tracing::instrument(
        name = "ingest.url",
        skip(self, request),
        fields(file_url = %request.file_url, s3.bucket = %request.target.bucket),
        err
    )]
    pub async fn upload_from_url(&self, request: UploadRequest) -> Result<UploadResult, UploadError> {
        let result: Result<UploadResult, UploadError> = async {
            let file = self.fetcher.fetch(request.file_url.as_str()).await?;
            self.uploader
                .upload(file.bytes, &file.content_type, &request.target)
                .await
        }
        .await;

        record_outcome("url", &result);
        result
    }

    /// Store a file received in the request body
    #[tracing::instrument(
        name = "ingest.direct",
        skip(self, upload),
        fields(file_name = %upload.file.file_name, s3.bucket = %upload.target.bucket),
        err
    )]
    pub async fn upload_direct(&self, upload: DirectUpload) -> Result<UploadResult, UploadError> {
        let result: Result<UploadResult, UploadError> = async {
            let DirectUpload { target, file } = upload;

            let size = file.bytes.len() as u64;
            let limit = self.max_file_size();
            if size > limit {
                return Err(UploadError::SizeExceeded { size, limit });
            }

            let content_type = resolve_content_type(file.content_type.as_deref(), &file.file_name);
            self.uploader.upload(file.bytes, &content_type, &target).await
        }
        .await;

        record_outcome("direct", &result);
        result
    }
}

fn record_outcome(source: &str, result: &Result<UploadResult, UploadError>) {
    match result {
        Ok(uploaded) => {
            metrics::record_upload_success(source, uploaded.size);
            info!(
                source,
                public_url = %uploaded.public_url,
                bytes = uploaded.size,
                "File uploaded"
            );
        }
        Err(e) => record_failure(source, e),
    }
}

fn record_failure(source: &str, error: &UploadError) {
    metrics::record_upload_failure(source);
    metrics::record_error(error.kind());
}
