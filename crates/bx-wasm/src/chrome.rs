//! `chrome.*` extension APIs behind the core storage and engine traits.

use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use bx_core::rules::{FilterRule, RuleUpdate};
use bx_core::store::{KeyValueStore, StoreError};
use bx_core::sync::{EngineError, FilterEngine};

use crate::{from_js_json, js_message, strings_from_js, strings_to_js, to_js_json};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get, catch)]
    fn storage_local_get(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set, catch)]
    fn storage_local_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener, catch)]
    fn storage_on_changed_add(listener: &Function) -> Result<(), JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "onChanged"], js_name = removeListener, catch)]
    fn storage_on_changed_remove(listener: &Function) -> Result<(), JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "declarativeNetRequest"], js_name = getDynamicRules, catch)]
    fn dnr_get_dynamic_rules() -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "declarativeNetRequest"], js_name = updateDynamicRules, catch)]
    fn dnr_update_dynamic_rules(options: &JsValue) -> Result<Promise, JsValue>;
}

fn store_err(value: JsValue) -> StoreError {
    StoreError::Backend(js_message(&value))
}

fn engine_err(value: JsValue) -> EngineError {
    EngineError::Backend(js_message(&value))
}

// =============================================================================
// Storage
// =============================================================================

/// `chrome.storage.local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStore;

impl KeyValueStore for ChromeStore {
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        let promise = storage_local_get(&JsValue::from_str(key)).map_err(store_err)?;
        let items = JsFuture::from(promise).await.map_err(store_err)?;
        let value = Reflect::get(&items, &JsValue::from_str(key)).map_err(store_err)?;

        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        if !value.is_instance_of::<js_sys::Array>() {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "expected an array".to_string(),
            });
        }
        Ok(Some(strings_from_js(&value)))
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let items = js_sys::Object::new();
        Reflect::set(&items, &JsValue::from_str(key), &strings_to_js(values)).map_err(store_err)?;
        let promise = storage_local_set(&items).map_err(store_err)?;
        JsFuture::from(promise).await.map_err(store_err)?;
        Ok(())
    }
}

/// A registered `chrome.storage.onChanged` listener. Unregistered on drop.
pub struct StorageListener {
    callback: Closure<dyn FnMut(JsValue, JsValue)>,
}

impl StorageListener {
    /// Call `on_change(key, new_values)` for every changed key in
    /// `chrome.storage.local`.
    pub fn register<F>(mut on_change: F) -> Result<Self, JsValue>
    where
        F: FnMut(&str, Vec<String>) + 'static,
    {
        let callback = Closure::wrap(Box::new(move |changes: JsValue, area: JsValue| {
            if area.as_string().as_deref() != Some("local") {
                return;
            }
            let keys = js_sys::Object::keys::<JsValue>(changes.unchecked_ref());
            for key in keys.iter().filter_map(|k| k.as_string()) {
                let new_value = Reflect::get(&changes, &JsValue::from_str(&key))
                    .and_then(|change| Reflect::get(&change, &"newValue".into()))
                    .unwrap_or(JsValue::UNDEFINED);
                on_change(&key, strings_from_js(&new_value));
            }
        }) as Box<dyn FnMut(JsValue, JsValue)>);

        storage_on_changed_add(callback.as_ref().unchecked_ref())?;
        Ok(Self { callback })
    }
}

impl Drop for StorageListener {
    fn drop(&mut self) {
        if let Err(e) = storage_on_changed_remove(self.callback.as_ref().unchecked_ref()) {
            log::warn!("Could not remove storage listener: {}", js_message(&e));
        }
    }
}

// =============================================================================
// Filtering Engine
// =============================================================================

/// `chrome.declarativeNetRequest` dynamic rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeFilterEngine;

impl FilterEngine for ChromeFilterEngine {
    async fn get_dynamic_rules(&self) -> Result<Vec<FilterRule>, EngineError> {
        let promise = dnr_get_dynamic_rules().map_err(engine_err)?;
        let rules = JsFuture::from(promise).await.map_err(engine_err)?;
        from_js_json(&rules).map_err(EngineError::Backend)
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let options = to_js_json(&update).map_err(EngineError::Backend)?;
        let promise = dnr_update_dynamic_rules(&options).map_err(engine_err)?;
        JsFuture::from(promise)
            .await
            .map_err(|e| EngineError::Rejected(js_message(&e)))?;
        Ok(())
    }
}
