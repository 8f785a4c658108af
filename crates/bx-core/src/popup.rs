//! Popup controller
//!
//! Backs the extension popup: the add-pattern input, the removable pattern
//! list and the hide-feature toggles. Every list change is saved and then
//! pushed to the filtering engine.

use std::time::Duration;

use crate::features::{HiddenFeature, HiddenFeatureSet};
use crate::pattern::{normalize_pattern, PatternError};
use crate::store::{BlockStore, KeyValueStore, StoreError};
use crate::sync::{EngineError, FilterEngine, RuleSynchronizer};
use crate::types::{BlockList, BlockPattern, ListError};

/// How long an inline error stays visible.
pub const ERROR_DISMISS_AFTER: Duration = Duration::from_secs(3);

/// Error type for popup actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopupError {
    #[error("Invalid URL")]
    InvalidPattern(#[source] PatternError),
    #[error("Site is already blocked")]
    DuplicatePattern(BlockPattern),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<ListError> for PopupError {
    fn from(err: ListError) -> Self {
        match err {
            ListError::DuplicatePattern(pattern) => PopupError::DuplicatePattern(pattern),
        }
    }
}

impl PopupError {
    /// Validation errors are shown inline; anything else is a real failure.
    pub fn is_user_error(&self) -> bool {
        matches!(self, PopupError::InvalidPattern(_) | PopupError::DuplicatePattern(_))
    }
}

/// Inline error text under the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub dismiss_after: Duration,
}

impl From<&PopupError> for ErrorNotice {
    fn from(err: &PopupError) -> Self {
        Self {
            message: err.to_string(),
            dismiss_after: ERROR_DISMISS_AFTER,
        }
    }
}

/// One row of the feature accordion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureToggle {
    pub id: &'static str,
    pub label: &'static str,
    pub enabled: bool,
}

/// Everything the popup renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub patterns: Vec<String>,
    pub features: Vec<FeatureToggle>,
}

impl PopupView {
    fn new(list: &BlockList, features: HiddenFeatureSet) -> Self {
        Self {
            patterns: list.to_stored(),
            features: HiddenFeature::ALL
                .iter()
                .map(|&f| FeatureToggle {
                    id: f.id(),
                    label: f.label(),
                    enabled: features.is_enabled(f),
                })
                .collect(),
        }
    }

    /// Whether to show the empty-state placeholder.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Popup actions over a store and a filtering engine.
pub struct PopupController<S, E> {
    store: BlockStore<S>,
    sync: RuleSynchronizer<E>,
}

impl<S: KeyValueStore, E: FilterEngine> PopupController<S, E> {
    pub fn new(store: S, engine: E) -> Self {
        Self {
            store: BlockStore::new(store),
            sync: RuleSynchronizer::new(engine),
        }
    }

    pub async fn load(&self) -> Result<PopupView, PopupError> {
        let list = self.store.load_block_list().await?;
        let features = self.store.load_hidden_features().await?;
        Ok(PopupView::new(&list, features))
    }

    /// Normalize and append `raw`. Blank input is ignored.
    ///
    /// Validation and the duplicate check run before anything is written.
    pub async fn add_pattern(&self, raw: &str) -> Result<PopupView, PopupError> {
        let pattern = match normalize_pattern(raw) {
            Ok(pattern) => pattern,
            Err(PatternError::Empty) => return self.load().await,
            Err(e) => return Err(PopupError::InvalidPattern(e)),
        };

        let mut list = self.store.load_block_list().await?;
        list.insert(pattern.clone())?;

        self.store.save_block_list(&list).await?;
        self.sync.sync(&list).await?;
        log::info!("Blocked {} ({} patterns)", pattern, list.len());

        let features = self.store.load_hidden_features().await?;
        Ok(PopupView::new(&list, features))
    }

    /// Drop `pattern` and resync, even when it was not in the list.
    pub async fn remove_pattern(&self, pattern: &str) -> Result<PopupView, PopupError> {
        let mut list = self.store.load_block_list().await?;
        if list.remove(pattern) {
            log::info!("Unblocked {} ({} patterns)", pattern, list.len());
        }

        self.store.save_block_list(&list).await?;
        self.sync.sync(&list).await?;

        let features = self.store.load_hidden_features().await?;
        Ok(PopupView::new(&list, features))
    }

    /// Flip one hide feature.
    pub async fn set_feature(&self, feature: HiddenFeature, enabled: bool) -> Result<PopupView, PopupError> {
        let mut features = self.store.load_hidden_features().await?;
        features.set_enabled(feature, enabled);
        self.store.save_hidden_features(features).await?;
        log::info!("{} {}", feature.id(), if enabled { "enabled" } else { "disabled" });

        let list = self.store.load_block_list().await?;
        Ok(PopupView::new(&list, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FilterRule;
    use crate::store::{MemoryStore, BLOCKED_SITES_KEY};
    use crate::sync::MemoryFilterEngine;

    fn filters(rules: &[FilterRule]) -> Vec<(u32, String)> {
        rules
            .iter()
            .map(|r| (r.id, r.condition.url_filter.clone().unwrap_or_default()))
            .collect()
    }

    #[tokio::test]
    async fn test_add_patterns_syncs_rules() {
        let store = MemoryStore::new();
        let engine = MemoryFilterEngine::new();
        let popup = PopupController::new(&store, &engine);

        popup.add_pattern("https://www.youtube.com/").await.unwrap();
        popup.add_pattern("reddit.com/r/all").await.unwrap();
        let view = popup.add_pattern("  news.ycombinator.com  ").await.unwrap();

        assert_eq!(view.patterns, vec!["www.youtube.com", "reddit.com/r/all", "news.ycombinator.com"]);
        assert_eq!(
            filters(&engine.rules().unwrap()),
            vec![
                (1, "||www.youtube.com".to_string()),
                (2, "||reddit.com/r/all".to_string()),
                (3, "||news.ycombinator.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_renumbers_rules() {
        let store = MemoryStore::new();
        let engine = MemoryFilterEngine::new();
        let popup = PopupController::new(&store, &engine);
        for raw in ["a.com", "b.com", "c.com"] {
            popup.add_pattern(raw).await.unwrap();
        }

        let view = popup.remove_pattern("a.com").await.unwrap();
        assert_eq!(view.patterns, vec!["b.com", "c.com"]);
        assert_eq!(
            filters(&engine.rules().unwrap()),
            vec![(1, "||b.com".to_string()), (2, "||c.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_duplicate_leaves_state_unchanged() {
        let store = MemoryStore::new();
        let engine = MemoryFilterEngine::new();
        let popup = PopupController::new(&store, &engine);
        popup.add_pattern("a.com").await.unwrap();
        let rules_before = engine.rules().unwrap();

        let err = popup.add_pattern("https://a.com/").await.unwrap_err();
        assert_eq!(err, PopupError::DuplicatePattern(BlockPattern::from_stored("a.com")));
        assert_eq!(ErrorNotice::from(&err).message, "Site is already blocked");
        assert!(err.is_user_error());

        assert_eq!(store.get_list(BLOCKED_SITES_KEY).await.unwrap(), Some(vec!["a.com".to_string()]));
        assert_eq!(engine.rules().unwrap(), rules_before);
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let store = MemoryStore::new();
        let engine = MemoryFilterEngine::new();
        let popup = PopupController::new(&store, &engine);

        let err = popup.add_pattern("not a url").await.unwrap_err();
        let notice = ErrorNotice::from(&err);
        assert_eq!(notice.message, "Invalid URL");
        assert_eq!(notice.dismiss_after, Duration::from_secs(3));
        assert_eq!(store.get_list(BLOCKED_SITES_KEY).await.unwrap(), None);
        assert!(engine.rules().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let store = MemoryStore::new();
        let engine = MemoryFilterEngine::new();
        let popup = PopupController::new(&store, &engine);
        let view = popup.add_pattern("   ").await.unwrap();
        assert!(view.is_empty());
        assert_eq!(store.get_list(BLOCKED_SITES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_feature_toggle() {
        let store = MemoryStore::new();
        let popup = PopupController::new(&store, MemoryFilterEngine::new());

        let view = popup.load().await.unwrap();
        assert_eq!(view.features.len(), 1);
        assert!(!view.features[0].enabled);

        let view = popup.set_feature(HiddenFeature::YoutubeShorts, true).await.unwrap();
        assert_eq!(view.features[0].id, "youtube-shorts");
        assert!(view.features[0].enabled);
        let view = popup.set_feature(HiddenFeature::YoutubeShorts, false).await.unwrap();
        assert!(!view.features[0].enabled);
    }

    struct BrokenEngine;

    impl FilterEngine for BrokenEngine {
        async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError> {
            Err(EngineError::Backend("extension context invalidated".to_string()))
        }

        async fn update_dynamic_rules(&self, _update: crate::rules::RuleUpdate) -> Result<(), EngineError> {
            Err(EngineError::Backend("extension context invalidated".to_string()))
        }
    }

    #[tokio::test]
    async fn test_engine_failure_surfaces_after_save() {
        let store = MemoryStore::new();
        let popup = PopupController::new(&store, BrokenEngine);

        let err = popup.add_pattern("a.com").await.unwrap_err();
        assert!(matches!(err, PopupError::Engine(_)));
        assert!(!err.is_user_error());
        // storage and engine are left diverged
        assert_eq!(store.get_list(BLOCKED_SITES_KEY).await.unwrap(), Some(vec!["a.com".to_string()]));
    }
}
