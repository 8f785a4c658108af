//! Popup page: renders the controller's view and wires its events.
//!
//! Expected markup: `#urlInput`, `#blockBtn`, `#errorMsg`, `#blockedList`,
//! `#emptyState`, `#featuresHeader` and `#featureList`. Elements are shown and
//! hidden with the `hidden` class.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, HtmlInputElement, KeyboardEvent};

use bx_core::features::HiddenFeature;
use bx_core::popup::{ErrorNotice, PopupController, PopupError, PopupView};

use crate::chrome::{ChromeFilterEngine, ChromeStore};

const HIDDEN: &str = "hidden";

type ChromePopup = PopupController<ChromeStore, ChromeFilterEngine>;

fn by_id(document: &Document, id: &str) -> Result<Element, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing #{}", id)))
}

/// The popup's fixed elements.
#[derive(Clone)]
pub struct PopupElements {
    document: Document,
    input: HtmlInputElement,
    block_button: Element,
    error_msg: Element,
    blocked_list: Element,
    empty_state: Element,
    features_header: Element,
    feature_list: Element,
}

impl PopupElements {
    pub fn from_document(document: &Document) -> Result<Self, JsValue> {
        let input = by_id(document, "urlInput")?
            .dyn_into::<HtmlInputElement>()
            .map_err(|_| JsValue::from_str("#urlInput is not an <input>"))?;

        Ok(Self {
            document: document.clone(),
            input,
            block_button: by_id(document, "blockBtn")?,
            error_msg: by_id(document, "errorMsg")?,
            blocked_list: by_id(document, "blockedList")?,
            empty_state: by_id(document, "emptyState")?,
            features_header: by_id(document, "featuresHeader")?,
            feature_list: by_id(document, "featureList")?,
        })
    }

    pub fn render(&self, view: &PopupView) -> Result<(), JsValue> {
        self.render_patterns(view)?;
        self.render_features(view)
    }

    /// One `<li>` per pattern with a remove button carrying `data-pattern`.
    fn render_patterns(&self, view: &PopupView) -> Result<(), JsValue> {
        self.blocked_list.set_inner_html("");

        if view.is_empty() {
            self.empty_state.class_list().remove_1(HIDDEN)?;
            return Ok(());
        }
        self.empty_state.class_list().add_1(HIDDEN)?;

        for pattern in &view.patterns {
            let item = self.document.create_element("li")?;
            item.set_text_content(Some(pattern));

            let button = self.document.create_element("button")?;
            button.set_class_name("remove-btn");
            button.set_inner_html("&times;");
            button.set_attribute("title", "Remove")?;
            button.set_attribute("data-pattern", pattern)?;

            item.append_child(&button)?;
            self.blocked_list.append_child(&item)?;
        }
        Ok(())
    }

    /// One labelled checkbox per catalog entry, keyed by `data-feature`.
    fn render_features(&self, view: &PopupView) -> Result<(), JsValue> {
        self.feature_list.set_inner_html("");

        for toggle in &view.features {
            let label = self.document.create_element("label")?;
            label.set_class_name("feature-toggle");

            let checkbox = self
                .document
                .create_element("input")?
                .dyn_into::<HtmlInputElement>()
                .map_err(|_| JsValue::from_str("<input> is not an input"))?;
            checkbox.set_type("checkbox");
            checkbox.set_checked(toggle.enabled);
            checkbox.set_attribute("data-feature", toggle.id)?;

            let text = self.document.create_element("span")?;
            text.set_text_content(Some(toggle.label));

            label.append_child(&checkbox)?;
            label.append_child(&text)?;
            self.feature_list.append_child(&label)?;
        }
        Ok(())
    }

    /// Show `notice` under the input and hide it again after its delay.
    pub fn show_error(&self, notice: &ErrorNotice) -> Result<(), JsValue> {
        self.error_msg.set_text_content(Some(&notice.message));
        self.error_msg.class_list().remove_1(HIDDEN)?;

        let error_msg = self.error_msg.clone();
        let dismiss = Closure::once_into_js(move || {
            let _ = error_msg.class_list().add_1(HIDDEN);
        });
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        window.set_timeout_with_callback_and_timeout_and_arguments_0(
            dismiss.unchecked_ref(),
            notice.dismiss_after.as_millis() as i32,
        )?;
        Ok(())
    }

    pub fn clear_error(&self) -> Result<(), JsValue> {
        self.error_msg.class_list().add_1(HIDDEN)
    }

    pub fn error_visible(&self) -> bool {
        !self.error_msg.class_list().contains(HIDDEN)
    }

    pub fn error_text(&self) -> String {
        self.error_msg.text_content().unwrap_or_default()
    }
}

// =============================================================================
// Event Wiring
// =============================================================================

fn listen<F>(target: &EventTarget, event: &str, handler: F) -> Result<(), JsValue>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    // popup listeners live as long as the page
    closure.forget();
    Ok(())
}

/// Render a controller result, or show its error inline.
fn show(ui: &PopupElements, result: Result<PopupView, PopupError>) {
    let shown = match result {
        Ok(view) => ui.render(&view),
        Err(err) => {
            if !err.is_user_error() {
                log::error!("Popup action failed: {}", err);
            }
            ui.show_error(&ErrorNotice::from(&err))
        }
    };
    if let Err(e) = shown {
        log::error!("Could not update popup: {}", crate::js_message(&e));
    }
}

fn add_from_input(ui: &Rc<PopupElements>, popup: &Rc<ChromePopup>) {
    let ui = ui.clone();
    let popup = popup.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let raw = ui.input.value();
        let result = popup.add_pattern(&raw).await;
        if result.is_ok() && !raw.trim().is_empty() {
            ui.input.set_value("");
            if let Err(e) = ui.clear_error() {
                log::warn!("Could not clear error: {}", crate::js_message(&e));
            }
        }
        show(&ui, result);
    });
}

/// Load the popup state and attach every handler.
pub async fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
    let ui = Rc::new(PopupElements::from_document(&document)?);
    let popup = Rc::new(PopupController::new(ChromeStore, ChromeFilterEngine));

    show(&ui, popup.load().await);

    {
        let (ui_ref, popup_ref) = (ui.clone(), popup.clone());
        listen(&ui.block_button, "click", move |_| add_from_input(&ui_ref, &popup_ref))?;
    }

    {
        let (ui_ref, popup_ref) = (ui.clone(), popup.clone());
        listen(&ui.input, "keypress", move |event| {
            let enter = event
                .dyn_ref::<KeyboardEvent>()
                .map(|key| key.key() == "Enter")
                .unwrap_or(false);
            if enter {
                add_from_input(&ui_ref, &popup_ref);
            }
        })?;
    }

    {
        let (ui_ref, popup_ref) = (ui.clone(), popup.clone());
        listen(&ui.blocked_list, "click", move |event| {
            let pattern = event
                .target()
                .and_then(|target| target.dyn_into::<Element>().ok())
                .and_then(|el| el.closest(".remove-btn").ok().flatten())
                .and_then(|button| button.get_attribute("data-pattern"));
            let Some(pattern) = pattern else {
                return;
            };

            let (ui, popup) = (ui_ref.clone(), popup_ref.clone());
            wasm_bindgen_futures::spawn_local(async move {
                show(&ui, popup.remove_pattern(&pattern).await);
            });
        })?;
    }

    {
        let (ui_ref, popup_ref) = (ui.clone(), popup.clone());
        listen(&ui.feature_list, "change", move |event| {
            let Some(checkbox) = event
                .target()
                .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
            else {
                return;
            };
            let Some(feature) = checkbox
                .get_attribute("data-feature")
                .and_then(|id| HiddenFeature::from_id(&id))
            else {
                return;
            };

            let enabled = checkbox.checked();
            let (ui, popup) = (ui_ref.clone(), popup_ref.clone());
            wasm_bindgen_futures::spawn_local(async move {
                show(&ui, popup.set_feature(feature, enabled).await);
            });
        })?;
    }

    {
        let feature_list = ui.feature_list.clone();
        listen(&ui.features_header, "click", move |_| {
            let _ = feature_list.class_list().toggle(HIDDEN);
        })?;
    }

    Ok(())
}
