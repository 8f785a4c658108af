//! JSON file backends for the CLI.
//!
//! The storage file mirrors `chrome.storage.local` as one JSON object, and
//! the rules file holds the dynamic rule array. Missing files read as empty.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use bx_core::rules::{FilterRule, RuleUpdate};
use bx_core::store::{KeyValueStore, StoreError};
use bx_core::sync::{apply_update, EngineError, FilterEngine};

async fn read_optional(path: &Path) -> Result<Option<String>, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("Failed to read '{}': {}", path.display(), e)),
    }
}

/// Write through a sibling temp file so readers never see half a file.
async fn write_replace(path: &Path, text: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, text)
        .await
        .map_err(|e| format!("Failed to write '{}': {}", tmp.display(), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| format!("Failed to replace '{}': {}", path.display(), e))
}

// =============================================================================
// Storage File
// =============================================================================

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_object(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match read_optional(&self.path).await.map_err(StoreError::Backend)? {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(Map::new()),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Corrupt {
                key: self.path.display().to_string(),
                reason: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(StoreError::Corrupt {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        let object = self.read_object().await?;
        let value = match object.get(key) {
            Some(value) => value,
            None => return Ok(None),
        };
        let items = value.as_array().ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: "expected an array".to_string(),
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: format!("expected a string, found {}", item),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut object = self.read_object().await?;
        object.insert(
            key.to_string(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
        let text = serde_json::to_string_pretty(&Value::Object(object))
            .map_err(|e| StoreError::Backend(format!("Failed to serialize storage: {}", e)))?;
        write_replace(&self.path, &text).await.map_err(StoreError::Backend)
    }
}

// =============================================================================
// Rules File
// =============================================================================

pub struct FileFilterEngine {
    path: PathBuf,
}

impl FileFilterEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FilterEngine for FileFilterEngine {
    async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError> {
        match read_optional(&self.path).await.map_err(EngineError::Backend)? {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)
                .map_err(|e| EngineError::Backend(format!("Invalid rules file '{}': {}", self.path.display(), e))),
            _ => Ok(Vec::new()),
        }
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let mut rules = self.get_dynamic_rules().await?;
        apply_update(&mut rules, update)?;
        let text = serde_json::to_string_pretty(&rules)
            .map_err(|e| EngineError::Backend(format!("Failed to serialize rules: {}", e)))?;
        write_replace(&self.path, &text).await.map_err(EngineError::Backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bx_core::popup::PopupController;
    use bx_core::store::BLOCKED_SITES_KEY;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.get_list(BLOCKED_SITES_KEY).await.unwrap(), None);

        let engine = FileFilterEngine::new(dir.path().join("rules.json"));
        assert!(engine.get_dynamic_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"hiddenFeatures":["youtube-shorts"],"theme":"dark"}"#).unwrap();

        let store = JsonFileStore::new(&path);
        store.set_list(BLOCKED_SITES_KEY, &["a.com".to_string()]).await.unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["blockedSites"], serde_json::json!(["a.com"]));
        assert_eq!(value["hiddenFeatures"], serde_json::json!(["youtube-shorts"]));
        assert_eq!(value["theme"], serde_json::json!("dark"));
    }

    #[tokio::test]
    async fn test_corrupt_value_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"blockedSites":"a.com"}"#).unwrap();

        let err = JsonFileStore::new(&path).get_list(BLOCKED_SITES_KEY).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_popup_flow_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/storage.json"));
        let engine = FileFilterEngine::new(dir.path().join("nested/rules.json"));
        let popup = PopupController::new(&store, &engine);

        popup.add_pattern("a.com").await.unwrap();
        popup.add_pattern("b.com/x").await.unwrap();
        popup.remove_pattern("a.com").await.unwrap();

        let rules = engine.get_dynamic_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, 1);
        assert_eq!(rules[0].condition.url_filter.as_deref(), Some("||b.com/x"));
        assert_eq!(
            store.get_list(BLOCKED_SITES_KEY).await.unwrap(),
            Some(vec!["b.com/x".to_string()])
        );
    }
}
