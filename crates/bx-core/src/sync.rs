//! Rule synchronization
//!
//! Pushes the rules for the current block list into the filtering engine as a
//! single combined remove+add request. The engine owns the live rules; we only
//! ever submit full replacements.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::rules::{plan_update, FilterRule, RuleUpdate};
use crate::types::BlockList;

/// Error type for filtering engine calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Rule update rejected: {0}")]
    Rejected(String),
    #[error("Filtering engine failed: {0}")]
    Backend(String),
}

/// The browser's declarative filtering engine (dynamic rules only).
#[allow(async_fn_in_trait)]
pub trait FilterEngine {
    async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError>;

    /// Apply removals and additions as one atomic update.
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError>;
}

impl<T: FilterEngine> FilterEngine for &T {
    async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError> {
        (**self).get_dynamic_rules().await
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        (**self).update_dynamic_rules(update).await
    }
}

// =============================================================================
// Synchronizer
// =============================================================================

/// Replaces the engine's rule set with the rules for a block list.
pub struct RuleSynchronizer<E> {
    engine: E,
}

impl<E: FilterEngine> RuleSynchronizer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Remove every active rule and add one rule per pattern, in one call.
    ///
    /// Engine failures are returned as-is; nothing is retried and the stored
    /// list is not touched.
    pub async fn sync(&self, list: &BlockList) -> Result<RuleUpdate, EngineError> {
        let current = self.engine.get_dynamic_rules().await?;
        let update = plan_update(&current, list);
        log::info!(
            "Syncing dynamic rules: removing {}, adding {}",
            update.remove_rule_ids.len(),
            update.add_rules.len()
        );
        self.engine.update_dynamic_rules(update.clone()).await?;
        Ok(update)
    }
}

// =============================================================================
// Memory Engine
// =============================================================================

/// In-process engine holding dynamic rules.
#[derive(Debug, Default)]
pub struct MemoryFilterEngine {
    rules: Mutex<Vec<FilterRule>>,
}

impl MemoryFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<FilterRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    /// Snapshot of the active rules.
    pub fn rules(&self) -> Result<Vec<FilterRule>, EngineError> {
        let rules = self
            .rules
            .lock()
            .map_err(|_| EngineError::Backend("rule lock poisoned".to_string()))?;
        Ok(rules.clone())
    }
}

/// Apply an update to a rule vector, or leave it untouched and fail.
///
/// Rejects updates that would leave two rules with the same id, or a rule
/// with id 0.
pub fn apply_update(rules: &mut Vec<FilterRule>, update: RuleUpdate) -> Result<(), EngineError> {
    let removed: HashSet<u32> = update.remove_rule_ids.iter().copied().collect();
    let mut next: Vec<FilterRule> = rules.iter().filter(|r| !removed.contains(&r.id)).cloned().collect();

    let mut seen: HashSet<u32> = next.iter().map(|r| r.id).collect();
    for rule in update.add_rules {
        if rule.id == 0 {
            return Err(EngineError::Rejected("rule id must be positive".to_string()));
        }
        if !seen.insert(rule.id) {
            return Err(EngineError::Rejected(format!("duplicate rule id {}", rule.id)));
        }
        next.push(rule);
    }

    *rules = next;
    Ok(())
}

impl FilterEngine for MemoryFilterEngine {
    async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError> {
        self.rules()
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let mut rules = self
            .rules
            .lock()
            .map_err(|_| EngineError::Backend("rule lock poisoned".to_string()))?;
        apply_update(&mut rules, update)
    }
}
