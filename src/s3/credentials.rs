//! Per-request object store credentials
//!
//! Credentials arrive with each upload request and live only for that call.
//! They are never persisted and the secret never appears in `Debug` output.
//!
//! # Example
//!
//! ```
//! use r2_uploader::s3::Credentials;
//!
//! let creds = Credentials::new("access-key", "secret-key");
//! assert_eq!(creds.access_key_id(), "access-key");
//! assert!(!format!("{:?}", creds).contains("secret-key"));
//! ```

use std::fmt;

/// Provider name attached to SDK credentials
const PROVIDER_NAME: &str = "r2-uploader-request";

/// Access key pair supplied by the caller
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Convert into static SDK credentials
    pub(crate) fn to_sdk(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            None, // session token
            None, // expiration
            PROVIDER_NAME,
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_creation() {
        let creds = Credentials::new("access", "secret");
        assert_eq!(creds.access_key_id(), "access");
        assert_eq!(creds.secret_access_key(), "secret");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("access", "very-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("access"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_to_sdk() {
        let sdk = Credentials::new("access", "secret").to_sdk();
        assert_eq!(sdk.access_key_id(), "access");
        assert_eq!(sdk.secret_access_key(), "secret");
        assert!(sdk.session_token().is_none());
    }
}
