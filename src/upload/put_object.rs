//! PutObject handler
//!
//! Validates the object key, pushes the payload to the caller's bucket with a
//! per-call [`S3Client`] and derives the public URL.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use r2_uploader::s3::Credentials;
//! use r2_uploader::upload::{R2Uploader, UploadHandler, UploadTarget};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = UploadTarget {
//!     bucket: "my-bucket".to_string(),
//!     key: "images/logo.png".to_string(),
//!     endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
//!     credentials: Credentials::new("access-key", "secret-key"),
//!     custom_domain: Some("https://cdn.example.com".to_string()),
//! };
//!
//! let result = R2Uploader::new()
//!     .upload(Bytes::from_static(b"\x89PNG"), "image/png", &target)
//!     .await?;
//! assert_eq!(result.public_url, "https://cdn.example.com/images/logo.png");
//! # Ok(())
//! # }
//! ```

use super::{UploadError, UploadHandler, UploadResult, UploadTarget};
use crate::metrics;
use crate::s3::{S3Client, S3ClientConfig, S3ClientError};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Instant;

/// Reject keys the store would interpret differently than the caller intends
pub fn validate_object_key(key: &str) -> Result<(), UploadError> {
    if key.is_empty() {
        return Err(UploadError::InvalidKey("object key cannot be empty".into()));
    }
    if key.starts_with('/') {
        return Err(UploadError::InvalidKey(
            "object key cannot start with '/'".into(),
        ));
    }
    Ok(())
}

/// Public address of an uploaded object
///
/// `<custom_domain>/<key>` when a non-empty custom domain is given, otherwise
/// `<endpoint>/<bucket>/<key>`. Trailing slashes on the base are dropped.
pub fn public_url(endpoint: &str, bucket: &str, key: &str, custom_domain: Option<&str>) -> String {
    match custom_domain.map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => format!("{}/{}", domain.trim_end_matches('/'), key),
        None => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
    }
}

/// Final path segment of an object key
pub fn file_name(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

/// Uploads to R2 or any S3-compatible store
#[derive(Debug, Default, Clone, Copy)]
pub struct R2Uploader;

impl R2Uploader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UploadHandler for R2Uploader {
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, payload, target),
        fields(
            s3.bucket = %target.bucket,
            s3.key = %target.key,
            http.content_type = %content_type,
            upload.bytes = payload.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        payload: Bytes,
        content_type: &str,
        target: &UploadTarget,
    ) -> Result<UploadResult, UploadError> {
        validate_object_key(&target.key)?;

        let client = S3Client::new(S3ClientConfig {
            bucket: target.bucket.clone(),
            endpoint: target.endpoint.clone(),
            credentials: target.credentials.clone(),
        })
        .map_err(|e| match e {
            S3ClientError::ConfigError(msg) => UploadError::Validation(msg),
            other => UploadError::UploadFailed(other.to_string()),
        })?;

        let size = payload.len() as u64;
        let start_time = Instant::now();
        let upload_result = client.put_object(&target.key, payload, content_type).await;
        let duration = start_time.elapsed();
        metrics::record_upload_duration(&target.bucket, duration.as_secs_f64());

        match upload_result {
            Ok(response) => {
                tracing::Span::current().record("s3.etag", response.etag.as_str());
                tracing::info!(
                    etag = %response.etag,
                    bytes = size,
                    duration_ms = duration.as_millis(),
                    "PutObject upload completed"
                );

                Ok(UploadResult {
                    public_url: public_url(
                        &target.endpoint,
                        &target.bucket,
                        &target.key,
                        target.custom_domain.as_deref(),
                    ),
                    size,
                    content_type: content_type.to_string(),
                    file_name: file_name(&target.key),
                })
            }
            Err(e) => {
                metrics::record_error("s3_upload");
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "PutObject upload failed"
                );
                Err(UploadError::UploadFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::Credentials;

    #[test]
    fn test_validate_object_key() {
        assert!(validate_object_key("a/c.png").is_ok());
        assert!(validate_object_key("file.txt").is_ok());
        assert!(matches!(
            validate_object_key("/a/c.png"),
            Err(UploadError::InvalidKey(_))
        ));
        assert!(matches!(validate_object_key(""), Err(UploadError::InvalidKey(_))));
    }

    #[test]
    fn test_public_url_without_custom_domain() {
        assert_eq!(
            public_url("https://x.test", "b", "a/c.png", None),
            "https://x.test/b/a/c.png"
        );
        assert_eq!(
            public_url("https://x.test/", "b", "a/c.png", Some("")),
            "https://x.test/b/a/c.png"
        );
    }

    #[test]
    fn test_public_url_with_custom_domain() {
        assert_eq!(
            public_url("https://x.test", "b", "a/c.png", Some("https://cdn.test/")),
            "https://cdn.test/a/c.png"
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("a/c.png"), "c.png");
        assert_eq!(file_name("c.png"), "c.png");
        assert_eq!(file_name("deep/nested/path/report.pdf"), "report.pdf");
    }

    #[tokio::test]
    async fn test_upload_rejects_leading_slash_before_network() {
        let target = UploadTarget {
            bucket: "b".into(),
            key: "/a/c.png".into(),
            // Unroutable: the test fails loudly if a request is attempted
            endpoint: "http://127.0.0.1:1".into(),
            credentials: Credentials::new("ak", "sk"),
            custom_domain: None,
        };

        let result = R2Uploader::new()
            .upload(Bytes::from_static(b"data"), "image/png", &target)
            .await;
        assert!(matches!(result, Err(UploadError::InvalidKey(_))));
    }
}
