//! Key-value store contract and built-in backends
//!
//! This module defines the [`ContentStore`] trait that apps implement to
//! provide durable storage for index fragments, plus two built-in
//! implementations:
//!
//! - [`MemoryStore`]: HashMap-backed, for tests and in-memory indices
//! - [`FileStore`]: one file per key under a base directory (`native`
//!   feature, uses `tokio::fs`)
//!
//! ## Contract
//!
//! The store must be ACID per key: a successful `put` is durable, and a
//! reader never observes a partial value. Ordering across distinct keys is
//! unconstrained. Fragment keys are FID hex strings; root-pointer keys are
//! arbitrary caller-chosen names.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Minimal ACID-per-key store interface
///
/// Every method is a suspension point; nothing else in the index core
/// performs I/O.
#[async_trait]
pub trait ContentStore: Debug + Send + Sync {
    /// Read the value stored under `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `bytes` under `key`, atomically and durably
    ///
    /// Overwrites any previous value. Content-addressed callers only ever
    /// rewrite identical bytes, so overwriting is harmless there.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Check whether a value exists under `key`
    async fn exists(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// A simple in-memory store
///
/// Stores data in a HashMap with interior mutability (`Arc<RwLock<...>>`).
/// Cloning yields another handle onto the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<std::collections::HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.data.read().expect("RwLock poisoned").len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().expect("RwLock poisoned").get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.data
            .write()
            .expect("RwLock poisoned")
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.read().expect("RwLock poisoned").contains_key(key))
    }
}

// ============================================================================
// FileStore (native only)
// ============================================================================

/// File-backed store: one file per key under a base directory
///
/// Intentionally behind the `native` feature because it depends on
/// `tokio::fs`. Keys map to relative paths; absolute paths and `..`
/// traversal are rejected.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: std::path::PathBuf,
}

#[cfg(feature = "native")]
impl FileStore {
    /// Create a new file store rooted at `base_path`
    pub fn new(base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Base directory for this store
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    fn resolve_path(&self, key: &str) -> Result<std::path::PathBuf> {
        use std::path::Component;
        let p = std::path::Path::new(key);
        if p.is_absolute()
            || p.components().any(|c| {
                matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
            })
        {
            return Err(Error::io(format!(
                "invalid storage key '{key}': must be a relative path without '..'"
            )));
        }
        Ok(self.base_path.join(p))
    }
}

#[cfg(feature = "native")]
#[async_trait]
impl ContentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store_unavailable(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        // Write to a sibling temp file, then rename: readers never observe
        // a partial value.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            Error::store_unavailable(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            Error::store_unavailable(format!("failed to commit {}: {e}", path.display()))
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store_unavailable(format!(
                "failed to stat {}: {e}",
                path.display()
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
