//! Token Authority
//!
//! Issues, rotates and verifies the single shared bearer token that gates the
//! upload endpoints.
//!
//! The active token is never cached: every call goes back to the configured
//! override or to the [`TokenStore`], so a rotation is visible to the very next
//! verification.
//!
//! # Example
//!
//! ```
//! use r2_uploader::token::{MemoryTokenStore, TokenAuthority};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authority = TokenAuthority::new(Arc::new(MemoryTokenStore::new()), None);
//! let token = authority.issue_default().await?;
//! assert!(authority.verify(token.as_str()).await?);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod store;

pub use store::{FileTokenStore, MemoryTokenStore};

/// Number of random bytes mixed into a generated token
const RANDOM_BYTES: usize = 32;

/// Length of the base64 slice appended to the UUID part
const RANDOM_SUFFIX_LEN: usize = 20;

/// Token errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No API token has been configured")]
    NotConfigured,

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Token file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opaque bearer token
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a token value, trimming incidental whitespace
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self(value.trim().to_string())
    }

    /// Borrow the token value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty after trimming
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Durable storage for the active token
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, `None` when nothing has been saved yet
    async fn load(&self) -> Result<Option<Token>, TokenError>;

    /// Persist a token, replacing any previous value
    async fn save(&self, token: &Token) -> Result<(), TokenError>;
}

/// Token introspection result
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    /// Active token, empty when none is configured
    pub token: String,
    /// Tokens never expire
    pub is_permanent: bool,
}

/// Issues and verifies the process-wide API token
pub struct TokenAuthority {
    store: Arc<dyn TokenStore>,
    override_token: Option<Token>,
}

impl TokenAuthority {
    /// Create a token authority.
    ///
    /// `override_token` takes precedence over the persisted value; blank
    /// overrides are ignored.
    pub fn new(store: Arc<dyn TokenStore>, override_token: Option<String>) -> Self {
        let override_token = override_token.map(Token::new).filter(|t| !t.is_empty());
        Self {
            store,
            override_token,
        }
    }

    /// Whether an override token is configured
    pub fn has_override(&self) -> bool {
        self.override_token.is_some()
    }

    /// Currently active token, if any
    ///
    /// A storage read failure is logged and treated as "no token".
    pub async fn current(&self) -> Option<Token> {
        if let Some(token) = &self.override_token {
            return Some(token.clone());
        }

        match self.store.load().await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted API token");
                None
            }
        }
    }

    /// Return the active token, generating and persisting one if none exists
    pub async fn issue_default(&self) -> Result<Token, TokenError> {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let token = generate_token();
        self.store.save(&token).await?;
        info!("Generated and persisted default API token");
        Ok(token)
    }

    /// Generate a new token and persist it, invalidating the previous one
    pub async fn reset(&self) -> Result<Token, TokenError> {
        let token = generate_token();
        self.store.save(&token).await?;
        crate::metrics::record_token_rotation();

        if self.has_override() {
            warn!("API token was reset, but the configured override token remains in effect");
        } else {
            info!("API token was reset");
        }
        Ok(token)
    }

    /// Check a candidate against the active token
    ///
    /// Fails with [`TokenError::NotConfigured`] when no token exists anywhere.
    pub async fn verify(&self, candidate: &str) -> Result<bool, TokenError> {
        let active = self.current().await.ok_or(TokenError::NotConfigured)?;
        Ok(candidate.trim() == active.as_str())
    }

    /// Describe the active token
    pub async fn describe(&self) -> TokenInfo {
        TokenInfo {
            token: self
                .current()
                .await
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            is_permanent: true,
        }
    }
}

/// Generate a new URL-safe token from a CSPRNG.
///
/// The result is a v4 UUID without separators followed by a slice of
/// base64url-encoded random bytes.
pub fn generate_token() -> Token {
    let mut random = [0u8; RANDOM_BYTES];
    rand::rng().fill_bytes(&mut random);

    let encoded = URL_SAFE_NO_PAD.encode(random);
    let id = uuid::Uuid::new_v4().simple().to_string();

    Token(format!("{}{}", id, &encoded[..RANDOM_SUFFIX_LEN]))
}
