//! Core type definitions for Blockex
//!
//! These types mirror what the extension keeps in `chrome.storage.local`
//! and are shared by the popup, the content script and the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Block Pattern
// =============================================================================

/// Canonical `hostname[/path]` pattern, without scheme.
///
/// Values are produced by [`crate::pattern::normalize_pattern`]; patterns read
/// back from storage are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockPattern(String);

impl BlockPattern {
    /// Wrap a stored pattern without re-normalizing it.
    pub fn from_stored(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BlockPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlockPattern {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Block List
// =============================================================================

/// Error for list mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("Pattern already blocked: {0}")]
    DuplicatePattern(BlockPattern),
}

/// Ordered list of unique block patterns.
///
/// Order is insertion order and decides rule numbering, not priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockList {
    patterns: Vec<BlockPattern>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from the raw `blockedSites` array.
    /// Repeated entries keep their first position.
    pub fn from_stored(values: Vec<String>) -> Self {
        let mut list = Self::new();
        for value in values {
            let pattern = BlockPattern::from_stored(value);
            if list.contains(&pattern) {
                log::debug!("Dropping repeated stored pattern {}", pattern);
                continue;
            }
            list.patterns.push(pattern);
        }
        list
    }

    /// Raw array form written back to storage.
    pub fn to_stored(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.as_str().to_string()).collect()
    }

    pub fn contains(&self, pattern: &BlockPattern) -> bool {
        self.patterns.iter().any(|p| p == pattern)
    }

    /// Append a pattern. Fails without touching the list if already present.
    pub fn insert(&mut self, pattern: BlockPattern) -> Result<(), ListError> {
        if self.contains(&pattern) {
            return Err(ListError::DuplicatePattern(pattern));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    /// Remove a pattern by its text. Returns whether anything was removed.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|p| p.as_str() != pattern);
        self.patterns.len() != before
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn as_slice(&self) -> &[BlockPattern] {
        &self.patterns
    }
}

impl<'a> IntoIterator for &'a BlockList {
    type Item = &'a BlockPattern;
    type IntoIter = std::slice::Iter<'a, BlockPattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}
