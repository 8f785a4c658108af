//! `web-sys` implementation of the enforcer's page traits.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, HtmlMediaElement, Window};

use bx_core::enforcer::{MediaElement, Page, PageElement, PageError};

fn dom_err(value: JsValue) -> PageError {
    PageError::Dom(crate::js_message(&value))
}

pub struct WebPage {
    window: Window,
    document: Document,
}

impl WebPage {
    pub fn from_global() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
        Ok(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn select<T: JsCast>(&self, selector: &str) -> Vec<T> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(e) => {
                log::warn!("Bad selector {}: {:?}", selector, e);
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<T>().ok())
            .collect()
    }
}

pub struct WebElement(Element);

impl PageElement for WebElement {
    fn tag_name(&self) -> String {
        self.0.tag_name()
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.0.has_attribute(name)
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        self.0.closest(selector).ok().flatten().map(WebElement)
    }

    fn is_hidden(&self) -> bool {
        self.0
            .dyn_ref::<HtmlElement>()
            .and_then(|el| el.style().get_property_value("display").ok())
            .map(|display| display == "none")
            .unwrap_or(false)
    }

    fn hide(&self) {
        if let Some(el) = self.0.dyn_ref::<HtmlElement>() {
            if let Err(e) = el.style().set_property("display", "none") {
                log::warn!("Could not hide <{}>: {:?}", self.0.tag_name(), e);
            }
        }
    }
}

pub struct WebMedia(HtmlMediaElement);

impl MediaElement for WebMedia {
    fn pause(&self) -> Result<(), PageError> {
        self.0.pause().map_err(dom_err)
    }

    fn mute(&self) -> Result<(), PageError> {
        self.0.set_muted(true);
        Ok(())
    }

    fn clear_source(&self) -> Result<(), PageError> {
        self.0.set_src("");
        Ok(())
    }

    fn detach(&self) -> Result<(), PageError> {
        self.0.remove();
        Ok(())
    }
}

impl Page for WebPage {
    type Element = WebElement;
    type Media = WebMedia;

    fn current_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn query_all(&self, selector: &str) -> Vec<WebElement> {
        self.select::<Element>(selector).into_iter().map(WebElement).collect()
    }

    fn media_elements(&self) -> Vec<WebMedia> {
        self.select::<HtmlMediaElement>("video, audio")
            .into_iter()
            .map(WebMedia)
            .collect()
    }

    fn stop_loading(&self) -> Result<(), PageError> {
        self.window.stop().map_err(dom_err)
    }

    fn replace_body(&self, html: &str) -> Result<(), PageError> {
        let body = self
            .document
            .body()
            .ok_or_else(|| PageError::Dom("document has no body".to_string()))?;
        body.set_inner_html(html);
        Ok(())
    }
}
