//! API Router
//!
//! Maps a method and path onto one of the service's routes.

use hyper::Method;
use thiserror::Error;

/// Prefix shared by the token and upload endpoints
pub const API_PREFIX: &str = "/R2api";

/// Router errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

/// Service routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// GET /health
    Health,
    /// GET /
    Root,
    /// GET /R2api/token
    GetToken,
    /// POST /R2api/init-token
    InitToken,
    /// POST /R2api/reset-token
    ResetToken,
    /// POST /R2api/upload
    Upload,
    /// POST /R2api/upload-direct
    UploadDirect,
    /// OPTIONS on any path
    Preflight,
}

impl Route {
    /// Resolve a request line to a route
    ///
    /// A single trailing slash is ignored on every path but `/`.
    pub fn parse(method: &Method, path: &str) -> Result<Route, RouterError> {
        if method == Method::OPTIONS {
            return Ok(Route::Preflight);
        }

        let normalized = match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => path,
        };

        let (expected, route) = match normalized {
            "/health" => (Method::GET, Route::Health),
            "/" | "" => (Method::GET, Route::Root),
            _ => match normalized.strip_prefix(API_PREFIX) {
                Some("/token") => (Method::GET, Route::GetToken),
                Some("/init-token") => (Method::POST, Route::InitToken),
                Some("/reset-token") => (Method::POST, Route::ResetToken),
                Some("/upload") => (Method::POST, Route::Upload),
                Some("/upload-direct") => (Method::POST, Route::UploadDirect),
                _ => return Err(RouterError::NotFound(path.to_string())),
            },
        };

        // HEAD is answered like GET, minus the body
        if method == expected || (expected == Method::GET && method == Method::HEAD) {
            Ok(route)
        } else {
            Err(RouterError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        }
    }

    /// Whether the route is behind bearer authentication
    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Upload | Route::UploadDirect)
    }

    /// Stable label for logs and spans
    pub fn name(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::Root => "root",
            Route::GetToken => "get_token",
            Route::InitToken => "init_token",
            Route::ResetToken => "reset_token",
            Route::Upload => "upload",
            Route::UploadDirect => "upload_direct",
            Route::Preflight => "preflight",
        }
    }
}
