//! Durable user identity
//!
//! Exactly one key-value pair is persisted: the user id under
//! [`USER_ID_KEY`]. It is read at startup and written once if absent, so the
//! id stays stable across sessions until the durable store is cleared.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::error::{Result, VigilError};

/// The single durable key used by the identity context
pub const USER_ID_KEY: &str = "vigil_user_id";

/// Durable key-value store for identity state
///
/// Implement this trait to back identity with whatever the host offers
/// (browser local storage, a preferences file, a keychain).
pub trait IdentityStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Store name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory identity store (default)
///
/// Identity does not survive the process; suitable for tests and ephemeral
/// embeddings.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop all stored entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| VigilError::StateLocked)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| VigilError::StateLocked)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// File-backed identity store (single JSON object file)
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Create a store backed by the given file; parent directories are
    /// created eagerly so the first write cannot fail on a missing path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VigilError::IdentityStoreFailure {
                reason: format!("Failed to create store directory: {}", e),
            })?;
        }
        Ok(Self { path })
    }

    fn read_entries(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| VigilError::IdentityStoreFailure {
                reason: format!("Failed to read store file: {}", e),
            })?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_entries(&self, entries: &HashMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents).map_err(|e| VigilError::IdentityStoreFailure {
            reason: format!("Failed to write store file: {}", e),
        })
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Lazy read-or-generate view over an [`IdentityStore`]
pub struct IdentityContext {
    store: Arc<dyn IdentityStore>,
}

impl IdentityContext {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// The durable user id, generated and persisted on first need
    pub fn user_id(&self) -> Result<String> {
        if let Some(existing) = self.store.get(USER_ID_KEY)? {
            return Ok(existing);
        }
        let fresh = generate_user_id();
        self.store.put(USER_ID_KEY, &fresh)?;
        Ok(fresh)
    }
}

fn generate_user_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}
