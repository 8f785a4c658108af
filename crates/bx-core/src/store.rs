//! Block list storage adapter
//!
//! The extension keeps two string arrays in `chrome.storage.local`. Both are
//! read and written wholesale; there are no partial updates.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::features::HiddenFeatureSet;
use crate::types::BlockList;

/// Storage key holding the block pattern array.
pub const BLOCKED_SITES_KEY: &str = "blockedSites";
/// Storage key holding the enabled hide-feature ids.
pub const HIDDEN_FEATURES_KEY: &str = "hiddenFeatures";

/// Error type for storage backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend failed: {0}")]
    Backend(String),
    #[error("Corrupt value under '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Async key-value storage holding string arrays.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read the array under `key`. `None` when the key was never written.
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Overwrite the array under `key`.
    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError>;
}

impl<T: KeyValueStore> KeyValueStore for &T {
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        (**self).get_list(key).await
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        (**self).set_list(key, values).await
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process store. The wasm content script seeds one from
/// `chrome.storage.local` and keeps it current with [`MemoryStore::replace`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a block list and enabled feature ids.
    pub fn with_values(blocked_sites: Vec<String>, hidden_features: Vec<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(BLOCKED_SITES_KEY.to_string(), blocked_sites);
        entries.insert(HIDDEN_FEATURES_KEY.to_string(), hidden_features);
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Synchronous overwrite, for hosts that receive storage change events.
    pub fn replace(&self, key: &str, values: Vec<String>) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), values);
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        self.replace(key, values.to_vec())
    }
}

// =============================================================================
// Block Store
// =============================================================================

/// Typed view over a [`KeyValueStore`].
pub struct BlockStore<S> {
    backend: S,
}

impl<S: KeyValueStore> BlockStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub async fn load_block_list(&self) -> Result<BlockList, StoreError> {
        let values = self.backend.get_list(BLOCKED_SITES_KEY).await?.unwrap_or_default();
        Ok(BlockList::from_stored(values))
    }

    pub async fn save_block_list(&self, list: &BlockList) -> Result<(), StoreError> {
        self.backend.set_list(BLOCKED_SITES_KEY, &list.to_stored()).await
    }

    pub async fn load_hidden_features(&self) -> Result<HiddenFeatureSet, StoreError> {
        let values = self.backend.get_list(HIDDEN_FEATURES_KEY).await?.unwrap_or_default();
        Ok(HiddenFeatureSet::from_ids(&values))
    }

    pub async fn save_hidden_features(&self, features: HiddenFeatureSet) -> Result<(), StoreError> {
        self.backend.set_list(HIDDEN_FEATURES_KEY, &features.to_ids()).await
    }
}
