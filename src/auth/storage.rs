use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::auth::token::TokenPair;
use crate::error::{storage, GatewayResult};

/// Keys under which tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Key-value persistence for the access and refresh tokens.
///
/// Callers read through the store on every use; implementations must not hand
/// out values cached from before a concurrent write.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: TokenKey) -> GatewayResult<Option<String>>;

    async fn set(&self, key: TokenKey, value: &str) -> GatewayResult<()>;

    async fn remove(&self, key: TokenKey) -> GatewayResult<()>;

    /// Store both tokens from a login
    async fn store_pair(&self, pair: &TokenPair) -> GatewayResult<()> {
        self.set(TokenKey::Access, &pair.access).await?;
        self.set(TokenKey::Refresh, &pair.refresh).await
    }

    /// Remove both tokens
    async fn clear(&self) -> GatewayResult<()> {
        self.remove(TokenKey::Access).await?;
        self.remove(TokenKey::Refresh).await
    }
}

/// Process-local token store
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a session
    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(TokenKey::Access, access.into());
        tokens.insert(TokenKey::Refresh, refresh.into());
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: TokenKey) -> GatewayResult<Option<String>> {
        Ok(self.tokens.read().await.get(&key).cloned())
    }

    async fn set(&self, key: TokenKey, value: &str) -> GatewayResult<()> {
        self.tokens.write().await.insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: TokenKey) -> GatewayResult<()> {
        self.tokens.write().await.remove(&key);
        Ok(())
    }

    async fn store_pair(&self, pair: &TokenPair) -> GatewayResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(TokenKey::Access, pair.access.clone());
        tokens.insert(TokenKey::Refresh, pair.refresh.clone());
        Ok(())
    }
}

/// Token store persisted as a flat JSON object on disk.
///
/// The file is re-read on every `get`, so a login or logout done by another
/// process is observed immediately.
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> GatewayResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                storage(format!(
                    "Failed to parse token file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(storage(format!(
                "Failed to read token file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, tokens: &HashMap<String, String>) -> GatewayResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write to a sibling file first so readers never see a partial file
        let tmp_path = self.path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(tokens)
            .map_err(|e| storage(format!("Failed to serialize tokens: {}", e)))?;
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> GatewayResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.load().await?;
        apply(&mut tokens);
        self.save(&tokens).await
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: TokenKey) -> GatewayResult<Option<String>> {
        Ok(self.load().await?.remove(key.as_str()))
    }

    async fn set(&self, key: TokenKey, value: &str) -> GatewayResult<()> {
        debug!(key = key.as_str(), path = %self.path.display(), "Persisting token");
        let value = value.to_string();
        self.update(move |tokens| {
            tokens.insert(key.as_str().to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: TokenKey) -> GatewayResult<()> {
        self.update(move |tokens| {
            tokens.remove(key.as_str());
        })
        .await
    }

    /// Both tokens land in one file write
    async fn store_pair(&self, pair: &TokenPair) -> GatewayResult<()> {
        let access = pair.access.clone();
        let refresh = pair.refresh.clone();
        self.update(move |tokens| {
            tokens.insert(TokenKey::Access.as_str().to_string(), access);
            tokens.insert(TokenKey::Refresh.as_str().to_string(), refresh);
        })
        .await
    }

    async fn clear(&self) -> GatewayResult<()> {
        self.update(|tokens| {
            tokens.remove(TokenKey::Access.as_str());
            tokens.remove(TokenKey::Refresh.as_str());
        })
        .await?;
        info!(path = %self.path.display(), "Tokens cleared from storage");
        Ok(())
    }
}
