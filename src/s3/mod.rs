//! S3 Client module
//!
//! Thin wrapper over `aws-sdk-s3` configured for Cloudflare R2 and other
//! S3-compatible stores: path-style addressing against a literal endpoint,
//! a placeholder region, and no retries.
//!
//! A client is built per upload from caller-supplied credentials.
//!
//! # Example
//!
//! ```no_run
//! use r2_uploader::s3::{Credentials, S3Client, S3ClientConfig};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = S3Client::new(S3ClientConfig {
//!     bucket: "my-bucket".to_string(),
//!     endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
//!     credentials: Credentials::new("access-key", "secret-key"),
//! })?;
//!
//! let response = client
//!     .put_object("hello.txt", Bytes::from("Hello, World!"), "text/plain")
//!     .await?;
//! println!("ETag: {}", response.etag);
//! # Ok(())
//! # }
//! ```

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;

pub mod credentials;

pub use credentials::Credentials;

/// R2 ignores regions; the SDK still needs one to sign requests
pub const R2_REGION: &str = "auto";

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),
}

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub bucket: String,
    pub endpoint: String,
    pub credentials: Credentials,
}

/// S3 Client
pub struct S3Client {
    config: S3ClientConfig,
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if config.bucket.trim().is_empty() {
            return Err(S3ClientError::ConfigError("bucket cannot be empty".into()));
        }

        let endpoint = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            S3ClientError::ConfigError(format!("invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(S3ClientError::ConfigError(format!(
                "endpoint must use http or https: {}",
                config.endpoint
            )));
        }

        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(R2_REGION))
            .credentials_provider(config.credentials.to_sdk())
            .endpoint_url(config.endpoint.trim_end_matches('/'))
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            config,
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Upload an object (PutObject)
    ///
    /// Sends the whole body in one request with explicit content length and
    /// content type. The object either exists afterwards or the call failed.
    ///
    /// # Tracing
    ///
    /// Creates a span named `s3.put_object` with attributes:
    /// - `s3.bucket` - Bucket name
    /// - `s3.key` - Object key
    /// - `upload.bytes` - Size of object
    /// - `s3.etag` - ETag from response (recorded after upload)
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            http.method = "PUT",
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let content_length = i64::try_from(body.len())
            .map_err(|_| S3ClientError::RequestError("body too large".into()))?;

        let output = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_length(content_length)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().unwrap_or_default().to_string();
        tracing::Span::current().record("s3.etag", etag.as_str());

        tracing::debug!(etag = %etag, "PutObject completed");

        Ok(S3PutObjectResponse { etag })
    }
}

/// S3 PutObject response
#[derive(Debug, Clone)]
pub struct S3PutObjectResponse {
    pub etag: String,
}
