//! Browser implementation of the supervisor `Host`
//!
//! Loader frames are hidden iframes appended to `document.body`. Posts go
//! through `Window.postMessage` with the exact target origin chosen by the
//! core.

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Document, HtmlIFrameElement, Performance, Window,
};
use xframe_supervisor::{FrameInfo, Host, HostError, SourceKind, TargetOrigin};

use crate::util::{log, to_js};

/// Browser host backed by the current window.
pub struct WebHost {
    window: Window,
    document: Document,
    performance: Option<Performance>,
}

impl WebHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let performance = window.performance();
        Ok(Self {
            window,
            document,
            performance,
        })
    }

    /// The supervisor page URL.
    pub fn location(&self) -> Result<String, JsValue> {
        self.window.location().href()
    }

    fn frame(&self, frame_id: &str) -> Result<HtmlIFrameElement, HostError> {
        self.document
            .get_element_by_id(frame_id)
            .and_then(|el| el.dyn_into::<HtmlIFrameElement>().ok())
            .ok_or_else(|| HostError::FrameNotFound(frame_id.to_string()))
    }

    fn build_frame(&self, frame: &FrameInfo) -> Result<HtmlIFrameElement, JsValue> {
        let iframe = self
            .document
            .create_element("iframe")?
            .dyn_into::<HtmlIFrameElement>()?;
        iframe.set_id(&frame.id);
        iframe.set_src(&frame.src);
        iframe.set_attribute("aria-hidden", "true")?;
        iframe.style().set_property("display", "none")?;
        Ok(iframe)
    }

    fn attach(&self, iframe: HtmlIFrameElement) -> Result<(), JsValue> {
        if self.document.ready_state() == "loading" {
            let document = self.document.clone();
            let on_ready = Closure::once_into_js(move || {
                match document.body() {
                    Some(body) => {
                        if let Err(e) = body.append_child(&iframe) {
                            log(&format!("[supervisor] Failed to attach loader frame: {:?}", e));
                        }
                    }
                    None => log("[supervisor] No document body for loader frame"),
                }
            });
            let options = AddEventListenerOptions::new();
            options.set_once(true);
            self.document
                .add_event_listener_with_callback_and_add_event_listener_options(
                    "DOMContentLoaded",
                    on_ready.unchecked_ref(),
                    &options,
                )?;
            return Ok(());
        }
        let body = self
            .document
            .body()
            .ok_or_else(|| JsValue::from_str("no document body"))?;
        body.append_child(&iframe)?;
        Ok(())
    }
}

/// Classify the sender of a message event relative to `window`.
pub fn classify_source(window: &Window, source: Option<&js_sys::Object>) -> SourceKind {
    let Some(source) = source else {
        return SourceKind::Other;
    };
    let is_same = |other: Result<Option<Window>, JsValue>| {
        other
            .ok()
            .flatten()
            .is_some_and(|w| js_sys::Object::is(source.as_ref(), w.as_ref()))
    };
    let is_top = is_same(window.top());
    let is_parent = is_same(window.parent());
    match (is_top, is_parent) {
        (true, true) => SourceKind::TopAndParent,
        (false, false) => SourceKind::Child,
        _ => SourceKind::Other,
    }
}

fn post_failed(e: JsValue) -> HostError {
    HostError::PostFailed(format!("{:?}", e))
}

impl Host for WebHost {
    fn post_to_parent(&self, message: &Value, target: &TargetOrigin) -> Result<(), HostError> {
        let parent = self
            .window
            .parent()
            .map_err(post_failed)?
            .ok_or_else(|| HostError::PostFailed("no parent window".to_string()))?;
        let data = to_js(message).map_err(post_failed)?;
        parent
            .post_message(&data, target.as_str())
            .map_err(post_failed)
    }

    fn post_to_frame(
        &self,
        frame_id: &str,
        message: &Value,
        target: &TargetOrigin,
    ) -> Result<(), HostError> {
        let content = self
            .frame(frame_id)?
            .content_window()
            .ok_or_else(|| HostError::FrameNotFound(frame_id.to_string()))?;
        let data = to_js(message).map_err(post_failed)?;
        content
            .post_message(&data, target.as_str())
            .map_err(post_failed)
    }

    fn create_frame(&self, frame: &FrameInfo) -> Result<(), HostError> {
        let iframe = self
            .build_frame(frame)
            .map_err(|e| HostError::FrameCreationFailed(format!("{}: {:?}", frame.id, e)))?;
        self.attach(iframe)
            .map_err(|e| HostError::FrameCreationFailed(format!("{}: {:?}", frame.id, e)))
    }

    fn remove_frame(&self, frame_id: &str) -> Result<(), HostError> {
        self.frame(frame_id)?.remove();
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        match &self.performance {
            Some(performance) => performance.now() as u64,
            None => js_sys::Date::now() as u64,
        }
    }

    fn log(&self, line: &str) {
        log(line);
    }
}
