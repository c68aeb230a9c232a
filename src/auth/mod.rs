//! Authentication module
//!
//! Protected endpoints require `Authorization: Bearer <token>` where the
//! token is the one currently held by the [`TokenAuthority`](crate::token::TokenAuthority).

use async_trait::async_trait;
use hyper::StatusCode;
use std::collections::HashMap;
use thiserror::Error;

pub mod bearer;

pub use bearer::BearerAuthenticator;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication token not provided")]
    MissingAuth,

    #[error("Invalid authentication format, expected a Bearer token")]
    InvalidScheme,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token verification error: {0}")]
    Verification(String),
}

impl AuthError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Verification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Authentication result
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub subject: String,
}

/// Authenticator trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResult, AuthError>;
}

/// Authentication request context
#[derive(Debug, Default)]
pub struct AuthRequest {
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub method: String,
    pub path: String,
}

impl AuthRequest {
    /// Build a request context from an HTTP request's parts
    pub fn from_parts(parts: &hyper::http::request::Parts) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in &parts.headers {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }

        Self {
            headers,
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
        }
    }

    /// Look up a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}
