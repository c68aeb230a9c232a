//! Upload request validation
//!
//! Raw request shapes (`UploadRequestBody` for the JSON flow,
//! `DirectUploadForm` for multipart) are validated into typed requests that
//! the ingest service consumes.

use super::{validate_object_key, UploadError, UploadTarget};
use crate::s3::Credentials;
use bytes::Bytes;
use reqwest::Url;
use serde::Deserialize;

/// JSON body of `POST /R2api/upload`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequestBody {
    #[serde(alias = "fileURL")]
    pub file_url: Option<String>,
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
    pub endpoint: Option<String>,
    #[serde(alias = "accessKeyID")]
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(alias = "customdomain")]
    pub custom_domain: Option<String>,
}

/// A validated URL-mode upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_url: Url,
    pub target: UploadTarget,
}

impl UploadRequestBody {
    /// Check required fields and URL shapes
    pub fn validate(self) -> Result<UploadRequest, UploadError> {
        let file_url = required(self.file_url, "fileUrl")?;
        let bucket = required(self.bucket_name, "bucketName")?;
        let key = required_raw(self.object_key, "objectKey")?;
        let endpoint = required(self.endpoint, "endpoint")?;
        let access_key_id = required_raw(self.access_key_id, "accessKeyId")?;
        let secret_access_key = required_raw(self.secret_access_key, "secretAccessKey")?;

        let file_url = parse_http_url(&file_url, "fileUrl")?;
        parse_http_url(&endpoint, "endpoint")?;
        validate_object_key(&key)?;

        Ok(UploadRequest {
            file_url,
            target: UploadTarget {
                bucket,
                key,
                endpoint,
                credentials: Credentials::new(access_key_id, secret_access_key),
                custom_domain: optional(self.custom_domain),
            },
        })
    }
}

/// File part of a multipart upload, already read under the size limit
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A validated direct-mode upload
#[derive(Debug, Clone)]
pub struct DirectUpload {
    pub target: UploadTarget,
    pub file: UploadedFile,
}

/// Text fields of `POST /R2api/upload-direct`
#[derive(Debug, Clone, Default)]
pub struct DirectUploadForm {
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub custom_domain: Option<String>,
}

impl DirectUploadForm {
    /// Record a text field; returns `false` for names the form does not know
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "bucket_name" => &mut self.bucket_name,
            "object_key" => &mut self.object_key,
            "endpoint" => &mut self.endpoint,
            "access_key_id" => &mut self.access_key_id,
            "secret_access_key" => &mut self.secret_access_key,
            "custom_domain" => &mut self.custom_domain,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Check required fields in order, then the file part
    ///
    /// The object key defaults to the uploaded file's name.
    pub fn validate(self, file: Option<UploadedFile>) -> Result<DirectUpload, UploadError> {
        let bucket = required(self.bucket_name, "bucket_name")?;
        let endpoint = required(self.endpoint, "endpoint")?;
        let access_key_id = required_raw(self.access_key_id, "access_key_id")?;
        let secret_access_key = required_raw(self.secret_access_key, "secret_access_key")?;
        let file = file.ok_or_else(|| UploadError::Validation("file is required".into()))?;

        parse_http_url(&endpoint, "endpoint")?;

        let key = self
            .object_key
            .filter(|v| !is_blank(v))
            .unwrap_or_else(|| file.file_name.clone());
        validate_object_key(&key)?;

        Ok(DirectUpload {
            target: UploadTarget {
                bucket,
                key,
                endpoint,
                credentials: Credentials::new(access_key_id, secret_access_key),
                custom_domain: optional(self.custom_domain),
            },
            file,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, UploadError> {
    optional(value).ok_or_else(|| UploadError::Validation(format!("{} is required", field)))
}

/// Like [`required`] but keeps surrounding whitespace
///
/// Object keys and credentials are passed to the store exactly as sent.
fn required_raw(value: Option<String>, field: &str) -> Result<String, UploadError> {
    value
        .filter(|v| !is_blank(v))
        .ok_or_else(|| UploadError::Validation(format!("{} is required", field)))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn parse_http_url(value: &str, field: &str) -> Result<Url, UploadError> {
    let url = Url::parse(value)
        .map_err(|e| UploadError::Validation(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UploadError::Validation(format!(
            "{} must use http or https, got {}",
            field, scheme
        ))),
    }
}
