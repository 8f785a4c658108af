//! WebAssembly bindings for Blockex
//!
//! The extension pages load this module and call one entry point each:
//! `start_popup` from the popup page, `start_content_script` from every
//! injected page. Both talk to `chrome.storage.local` and
//! `declarativeNetRequest` directly. The remaining exports are pure helpers.

mod chrome;
pub mod content;
mod dom;
pub mod popup;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use bx_core::matcher::{find_match, is_url_blocked};
use bx_core::pattern::normalize_pattern;
use bx_core::rules::{plan_update, FilterRule};
use bx_core::types::BlockList;

pub use crate::content::ContentScript;

#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    console_error_panic_hook::set_once();
    let level = if verbose { log::Level::Debug } else { log::Level::Warn };
    wasm_logger::init(wasm_logger::Config::new(level));
}

/// Popup page entry point.
#[wasm_bindgen]
pub async fn start_popup() -> Result<(), JsValue> {
    popup::start().await
}

/// Content script entry point. Keep the returned handle for the page's
/// lifetime; freeing it stops enforcement.
#[wasm_bindgen]
pub async fn start_content_script() -> Result<ContentScript, JsValue> {
    ContentScript::start().await
}

// =============================================================================
// Helpers For JS
// =============================================================================

/// Canonical pattern for `raw`, or the inline error message.
#[wasm_bindgen]
pub fn normalize_pattern_js(raw: &str) -> Result<String, JsValue> {
    normalize_pattern(raw)
        .map(|p| p.into_string())
        .map_err(|_| JsValue::from_str("Invalid URL"))
}

#[wasm_bindgen]
pub fn is_url_blocked_js(url: &str, pattern: &str) -> bool {
    is_url_blocked(url, pattern)
}

#[wasm_bindgen]
pub fn find_blocking_pattern(url: &str, sites: JsValue) -> Option<String> {
    let list = BlockList::from_stored(strings_from_js(&sites));
    find_match(url, &list).map(|p| p.as_str().to_string())
}

/// Build the `updateDynamicRules` argument from `getDynamicRules()` output
/// and the block list.
#[wasm_bindgen]
pub fn plan_rule_update(current_rules: JsValue, sites: JsValue) -> Result<JsValue, JsValue> {
    let current: Vec<FilterRule> =
        from_js_json(&current_rules).map_err(|e| JsValue::from_str(&format!("Invalid dynamic rules: {}", e)))?;
    let list = BlockList::from_stored(strings_from_js(&sites));
    to_js_json(&plan_update(&current, &list)).map_err(|e| JsValue::from_str(&e))
}

// =============================================================================
// Conversions
// =============================================================================

pub(crate) fn strings_from_js(value: &JsValue) -> Vec<String> {
    match value.dyn_ref::<js_sys::Array>() {
        Some(array) => array.iter().filter_map(|v| v.as_string()).collect(),
        None => Vec::new(),
    }
}

pub(crate) fn strings_to_js(values: &[String]) -> JsValue {
    let array = js_sys::Array::new_with_length(values.len() as u32);
    for (i, value) in values.iter().enumerate() {
        array.set(i as u32, JsValue::from_str(value));
    }
    array.into()
}

/// Deserialize a JS value by round-tripping through `JSON`.
pub(crate) fn from_js_json<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    let json = js_sys::JSON::stringify(value)
        .map_err(|e| js_message(&e))?
        .as_string()
        .unwrap_or_else(|| "null".to_string());
    serde_json::from_str(&json).map_err(|e| e.to_string())
}

pub(crate) fn to_js_json<T: Serialize>(value: &T) -> Result<JsValue, String> {
    let json = serde_json::to_string(value).map_err(|e| format!("Failed to serialize: {}", e))?;
    js_sys::JSON::parse(&json).map_err(|e| js_message(&e))
}

/// Best-effort text for a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    match value.dyn_ref::<js_sys::Error>() {
        Some(err) => String::from(err.message()),
        None => format!("{:?}", value),
    }
}
