//! Bearer token authentication against the shared API token

use super::{AuthError, AuthRequest, AuthResult, Authenticator};
use crate::metrics;
use crate::token::TokenAuthority;
use async_trait::async_trait;
use std::sync::Arc;

/// Subject reported for requests carrying the shared token
const SYSTEM_SUBJECT: &str = "system";

/// Authenticates `Authorization: Bearer <token>` headers
///
/// # Example
///
/// ```
/// use r2_uploader::auth::{AuthRequest, Authenticator, BearerAuthenticator};
/// use r2_uploader::token::{MemoryTokenStore, TokenAuthority};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let tokens = Arc::new(TokenAuthority::new(Arc::new(MemoryTokenStore::with_token("t0k3n")), None));
/// let auth = BearerAuthenticator::new(tokens);
///
/// let mut request = AuthRequest::default();
/// request.headers.insert("authorization".into(), "Bearer t0k3n".into());
/// assert!(auth.authenticate(&request).await.is_ok());
/// # }
/// ```
pub struct BearerAuthenticator {
    tokens: Arc<TokenAuthority>,
}

impl BearerAuthenticator {
    pub fn new(tokens: Arc<TokenAuthority>) -> Self {
        Self { tokens }
    }

    /// Extract the token from an `Authorization` header value
    pub fn extract_token(header: &str) -> Result<&str, AuthError> {
        let (scheme, token) = header.split_once(' ').ok_or(AuthError::InvalidScheme)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::InvalidScheme);
        }
        Ok(token)
    }
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResult, AuthError> {
        let header = request
            .header("authorization")
            .filter(|h| !h.is_empty())
            .ok_or(AuthError::MissingAuth)?;

        let token = Self::extract_token(header)?;

        match self.tokens.verify(token).await {
            Ok(true) => {
                metrics::record_auth_attempt(true);
                Ok(AuthResult {
                    subject: SYSTEM_SUBJECT.to_string(),
                })
            }
            Ok(false) => {
                metrics::record_auth_attempt(false);
                Err(AuthError::InvalidToken)
            }
            Err(e) => {
                metrics::record_error("token_verification");
                Err(AuthError::Verification(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    fn request_with(header: Option<&str>) -> AuthRequest {
        let mut request = AuthRequest::default();
        if let Some(h) = header {
            request.headers.insert("authorization".into(), h.into());
        }
        request
    }

    fn authenticator(token: Option<&str>) -> BearerAuthenticator {
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::new(),
        };
        BearerAuthenticator::new(Arc::new(TokenAuthority::new(Arc::new(store), None)))
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(BearerAuthenticator::extract_token("Bearer abc").unwrap(), "abc");
        assert_eq!(BearerAuthenticator::extract_token("bearer abc").unwrap(), "abc");
        assert!(matches!(
            BearerAuthenticator::extract_token("Basic abc"),
            Err(AuthError::InvalidScheme)
        ));
        assert!(matches!(
            BearerAuthenticator::extract_token("Bearer"),
            Err(AuthError::InvalidScheme)
        ));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let result = authenticator(Some("secret"))
            .authenticate(&request_with(None))
            .await;
        assert!(matches!(result, Err(AuthError::MissingAuth)));
    }

    #[tokio::test]
    async fn test_wrong_token() {
        let result = authenticator(Some("secret"))
            .authenticate(&request_with(Some("Bearer nope")))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_valid_token() {
        let result = authenticator(Some("secret"))
            .authenticate(&request_with(Some("Bearer secret")))
            .await
            .unwrap();
        assert_eq!(result.subject, "system");
    }

    #[tokio::test]
    async fn test_no_configured_token_is_verification_error() {
        let result = authenticator(None)
            .authenticate(&request_with(Some("Bearer secret")))
            .await;
        assert!(matches!(result, Err(AuthError::Verification(_))));
    }
}
