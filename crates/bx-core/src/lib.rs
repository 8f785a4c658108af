//! Blockex Core Library
//!
//! This crate holds the logic of the Blockex browser extension: a personal
//! block list of URL patterns plus a few toggles for hiding page features.
//!
//! # Architecture
//!
//! The browser pieces (storage, the declarative filtering engine and the DOM)
//! are reached through traits, so the same logic runs in the wasm build, in
//! the CLI and in tests.
//!
//! # Modules
//!
//! - `pattern`: Normalization of user input into block patterns
//! - `matcher`: Loose substring matching of page URLs against patterns
//! - `rules`: Declarative network rules generated from the block list
//! - `sync`: Full-replace synchronization of the filtering engine
//! - `store`: Storage adapter for the block list and hide features
//! - `features`: Hide-feature catalog and element-hiding rules
//! - `enforcer`: Content-script block and hide tracks
//! - `popup`: Popup actions and view model
//! - `types`: Shared type definitions

pub mod enforcer;
pub mod features;
pub mod matcher;
pub mod pattern;
pub mod popup;
pub mod rules;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use enforcer::{BlockState, BlockTrack, HideTrack, Page, PageEnforcer};
pub use features::{HiddenFeature, HiddenFeatureSet};
pub use matcher::{find_match, is_url_blocked};
pub use pattern::{normalize_pattern, PatternError};
pub use popup::{PopupController, PopupError, PopupView};
pub use rules::{build_rules, plan_update, FilterRule, RuleUpdate};
pub use store::{BlockStore, KeyValueStore, MemoryStore, StoreError};
pub use sync::{EngineError, FilterEngine, MemoryFilterEngine, RuleSynchronizer};
pub use types::{BlockList, BlockPattern, ListError};
