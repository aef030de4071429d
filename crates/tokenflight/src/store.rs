// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session store: persistence boundary for the current token pair.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::token::TokenPair;

/// Failure reading or writing the persisted token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    /// Persisted data exists but cannot be parsed.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "session store i/o: {msg}"),
            Self::Corrupt(msg) => write!(f, "session store corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Secure key-value persistence holding the current [`TokenPair`].
pub trait SessionStore: Send + Sync + 'static {
    fn load_token_pair(&self) -> BoxFuture<'_, Result<Option<TokenPair>, StoreError>>;

    fn save_token_pair(&self, pair: TokenPair) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove the stored pair. Returns whether one was present.
    fn clear_token_pair(&self) -> BoxFuture<'_, Result<bool, StoreError>>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self { pair: Mutex::new(Some(pair)) }
    }

    /// Synchronous snapshot of the stored pair.
    pub fn snapshot(&self) -> Option<TokenPair> {
        self.pair.lock().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load_token_pair(&self) -> BoxFuture<'_, Result<Option<TokenPair>, StoreError>> {
        let pair = self.pair.lock().clone();
        Box::pin(async move { Ok(pair) })
    }

    fn save_token_pair(&self, pair: TokenPair) -> BoxFuture<'_, Result<(), StoreError>> {
        *self.pair.lock() = Some(pair);
        Box::pin(async { Ok(()) })
    }

    fn clear_token_pair(&self) -> BoxFuture<'_, Result<bool, StoreError>> {
        let had = self.pair.lock().take().is_some();
        Box::pin(async move { Ok(had) })
    }
}

/// JSON file store. Writes go to a sibling `.tmp` file and are renamed into
/// place so a crash never leaves a half-written session.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load_token_pair(&self) -> BoxFuture<'_, Result<Option<TokenPair>, StoreError>> {
        Box::pin(async move {
            let data = match tokio::fs::read_to_string(&self.path).await {
                Ok(d) => d,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(StoreError::Io(e.to_string())),
            };
            let pair = serde_json::from_str(&data).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            Ok(Some(pair))
        })
    }

    fn save_token_pair(&self, pair: TokenPair) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let json = serde_json::to_string_pretty(&pair)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| StoreError::Io(e.to_string()))?;
            }
            let tmp = self.path.with_extension("tmp");
            tokio::fs::write(&tmp, json).await.map_err(|e| StoreError::Io(e.to_string()))?;
            tokio::fs::rename(&tmp, &self.path).await.map_err(|e| StoreError::Io(e.to_string()))?;
            debug!(path = %self.path.display(), "persisted session");
            Ok(())
        })
    }

    fn clear_token_pair(&self) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "cleared session");
                    Ok(true)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::Io(e.to_string())),
            }
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
