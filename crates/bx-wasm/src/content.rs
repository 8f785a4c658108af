//! Content script: drives the page enforcer from DOM and navigation events.
//!
//! Storage is read once at injection into a [`MemoryStore`] snapshot and kept
//! current from `chrome.storage.onChanged`, so every enforcer pass completes
//! synchronously inside the event callback that triggered it.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::FutureExt;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, MutationObserver, MutationObserverInit, Window};

use bx_core::enforcer::{BlockState, PageEnforcer};
use bx_core::store::{KeyValueStore, MemoryStore, BLOCKED_SITES_KEY, HIDDEN_FEATURES_KEY};

use crate::chrome::{ChromeStore, StorageListener};
use crate::dom::WebPage;
use crate::js_message;

type Enforcer = PageEnforcer<WebPage, MemoryStore>;

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Load,
    Mutation,
    Popstate,
}

/// Run one enforcer pass for `trigger`. Failures are logged.
fn dispatch(enforcer: &RefCell<Enforcer>, trigger: Trigger) {
    let Ok(mut enforcer) = enforcer.try_borrow_mut() else {
        log::debug!("Enforcer busy, dropping {:?} pass", trigger);
        return;
    };

    let pass = match trigger {
        Trigger::Load => enforcer.on_load().now_or_never(),
        Trigger::Mutation => enforcer.on_mutation().now_or_never(),
        Trigger::Popstate => enforcer.on_popstate().now_or_never(),
    };

    match pass {
        Some(Ok(())) => {}
        Some(Err(e)) => log::warn!("{:?} pass failed: {}", trigger, e),
        None => log::warn!("{:?} pass did not complete", trigger),
    }
}

/// Per-page enforcement, alive for as long as the page is.
#[wasm_bindgen]
pub struct ContentScript {
    enforcer: Rc<RefCell<Enforcer>>,
    window: Window,
    observer: MutationObserver,
    on_popstate: Closure<dyn FnMut(Event)>,
    _on_mutation: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    storage: Option<StorageListener>,
}

impl ContentScript {
    /// Read storage, enforce once and start listening.
    pub async fn start() -> Result<ContentScript, JsValue> {
        let read_err = |e: bx_core::store::StoreError| JsValue::from_str(&e.to_string());
        let blocked_sites = ChromeStore.get_list(BLOCKED_SITES_KEY).await.map_err(read_err)?;
        let hidden_features = ChromeStore.get_list(HIDDEN_FEATURES_KEY).await.map_err(read_err)?;

        let mut script = Self::with_snapshot(
            blocked_sites.unwrap_or_default(),
            hidden_features.unwrap_or_default(),
        )?;

        let enforcer = script.enforcer.clone();
        script.storage = Some(StorageListener::register(move |key, values| {
            match enforcer.try_borrow() {
                Ok(enforcer) => {
                    if let Err(e) = enforcer.store().backend().replace(key, values) {
                        log::warn!("Could not apply storage change: {}", e);
                    }
                }
                Err(_) => log::warn!("Enforcer busy, dropped change to '{}'", key),
            }
        })?);
        Ok(script)
    }

    /// Enforce against the given storage values and observe the document.
    pub fn with_snapshot(blocked_sites: Vec<String>, hidden_features: Vec<String>) -> Result<ContentScript, JsValue> {
        let page = WebPage::from_global()?;
        let window = page.window().clone();
        let document = page.document().clone();

        let store = MemoryStore::with_values(blocked_sites, hidden_features);
        let enforcer = Rc::new(RefCell::new(PageEnforcer::new(page, store)));
        dispatch(&enforcer, Trigger::Load);

        let on_mutation = {
            let enforcer = enforcer.clone();
            Closure::wrap(Box::new(move |_records: js_sys::Array, _observer: MutationObserver| {
                dispatch(&enforcer, Trigger::Mutation);
            }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>)
        };
        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer.observe_with_options(&document, &options)?;

        let on_popstate = {
            let enforcer = enforcer.clone();
            Closure::wrap(Box::new(move |_event: Event| {
                dispatch(&enforcer, Trigger::Popstate);
            }) as Box<dyn FnMut(Event)>)
        };
        window.add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref())?;

        Ok(ContentScript {
            enforcer,
            window,
            observer,
            on_popstate,
            _on_mutation: on_mutation,
            storage: None,
        })
    }
}

#[wasm_bindgen]
impl ContentScript {
    /// The pattern that blocked this page, if any.
    pub fn blocked_pattern(&self) -> Option<String> {
        match self.enforcer.borrow().block_state() {
            BlockState::Blocked(pattern) => Some(pattern.as_str().to_string()),
            BlockState::Checking | BlockState::Unblocked => None,
        }
    }
}

impl Drop for ContentScript {
    fn drop(&mut self) {
        self.observer.disconnect();
        if let Err(e) = self
            .window
            .remove_event_listener_with_callback("popstate", self.on_popstate.as_ref().unchecked_ref())
        {
            log::warn!("Could not remove popstate listener: {}", js_message(&e));
        }
    }
}
