//! Token Store implementations
//!
//! - `FileTokenStore` - JSON file on disk, the source of truth across restarts
//! - `MemoryTokenStore` - in-process store for tests and embedding

use super::{Token, TokenError, TokenStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// File name used inside candidate directories
const TOKEN_FILE_NAME: &str = "token_data.json";

/// Directories probed, in order, when no explicit path is configured
const CANDIDATE_DIRS: &[&str] = &["/var/lib/r2api", "/app/config", "/tmp"];

/// Fallback location relative to the working directory
const FALLBACK_RELATIVE_PATH: &str = "config/token_data.json";

/// On-disk layout of the token file
#[derive(Debug, Serialize, Deserialize)]
struct TokenData {
    token: String,
}

/// Token store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Use exactly the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the token file location.
    ///
    /// Order: explicit path (if its directory can be created), then the first
    /// writable directory among the standard candidates, then
    /// `<cwd>/config/token_data.json`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            match ensure_parent_dir(path) {
                Ok(()) => {
                    info!(path = %path.display(), "Using configured token file path");
                    return Self::new(path);
                }
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot create directory for configured token file path"
                ),
            }
        }

        for dir in CANDIDATE_DIRS {
            let dir = Path::new(dir);
            if is_writable_dir(dir) {
                let path = dir.join(TOKEN_FILE_NAME);
                info!(path = %path.display(), "Using writable token directory");
                return Self::new(path);
            }
        }

        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot determine working directory");
            PathBuf::from(".")
        });
        let path = cwd.join(FALLBACK_RELATIVE_PATH);
        info!(path = %path.display(), "Falling back to working directory for token file");
        Self::new(path)
    }

    /// Location of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| TOKEN_FILE_NAME.into());
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Token>, TokenError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Token file does not exist yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }

        let parsed: TokenData = serde_json::from_slice(&data)?;
        let token = Token::new(parsed.token);
        Ok((!token.is_empty()).then_some(token))
    }

    async fn save(&self, token: &Token) -> Result<(), TokenError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(&TokenData {
            token: token.as_str().to_string(),
        })?;

        // Write a sibling file and rename it so readers never see a partial token.
        let temp = self.temp_path();
        if let Err(e) = write_private(&temp, &data).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(TokenError::Storage(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        info!(path = %self.path.display(), "Saved API token");
        Ok(())
    }
}

/// Write a file readable and writable only by its owner
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn is_writable_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(format!(".write_test_{}", uuid::Uuid::new_v4().simple()));
    match std::fs::write(&probe, b"test") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<Token>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(Token::new(token))),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Token>, TokenError> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &Token) -> Result<(), TokenError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load().await, Err(TokenError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/token.json"));

        store.save(&Token::new("abc123")).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.as_str(), "abc123");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["token"], "abc123");

        // No temporary files are left behind
        let entries = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));
        store.save(&Token::new("abc123")).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("sub/token.json");

        let store = FileTokenStore::resolve(Some(&explicit));
        assert_eq!(store.path(), explicit.as_path());
        assert!(dir.path().join("sub").is_dir());
    }

    #[test]
    fn test_resolve_without_explicit_path() {
        let store = FileTokenStore::resolve(None);
        assert!(store.path().ends_with(TOKEN_FILE_NAME));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&Token::new("t")).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().as_str(), "t");
    }
}
