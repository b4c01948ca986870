//! Exported `Supervisor` class
//!
//! Owns the core supervisor behind `Rc<RefCell<_>>`. The window `message`
//! listener and the deadline timer are the only two entry points, and both
//! go through [`dispatch`], so the core handles one event at a time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::MessageEvent;
use xframe_protocol::Origin;
use xframe_supervisor::{
    Host, Outcome, RawMessage, Supervisor as Core, SupervisorConfig, SupervisorEvent,
};

use crate::host::{classify_source, WebHost};
use crate::util::{from_js, log};

type Shared = Rc<RefCell<Core<WebHost>>>;

/// Pending `setTimeout` handle for the next deadline.
type Timer = Rc<Cell<Option<i32>>>;

/// Supervisor for a page embedded as a hidden iframe.
#[wasm_bindgen]
pub struct Supervisor {
    core: Shared,
    timer: Timer,
    listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

#[wasm_bindgen]
impl Supervisor {
    /// Create a supervisor.
    ///
    /// `config_json` is an optional camelCase JSON configuration; absent
    /// fields keep their defaults and `location` defaults to this page.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Supervisor, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let host = WebHost::new()?;
        let mut config = match config_json.as_deref() {
            Some(json) => SupervisorConfig::from_json(json)
                .map_err(|e| JsValue::from_str(&format!("invalid supervisor config: {e}")))?,
            None => SupervisorConfig::default(),
        };
        if config.location.is_empty() {
            config.location = host.location()?;
        }

        let core = Core::new(host, config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self {
            core: Rc::new(RefCell::new(core)),
            timer: Rc::new(Cell::new(None)),
            listener: None,
        })
    }

    /// Install the `message` listener and announce to the parent.
    pub fn start(&mut self) -> Result<(), JsValue> {
        if self.listener.is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let core = self.core.clone();
        let timer = self.timer.clone();
        let this_window = window.clone();
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            let source = classify_source(&this_window, event.source().as_ref());
            let raw = RawMessage::new(Origin::new(event.origin()), source, from_js(&event.data()));
            dispatch(&core, &timer, SupervisorEvent::Message(raw));
        }) as Box<dyn FnMut(MessageEvent)>);

        window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;
        self.listener = Some(listener);

        self.core
            .borrow()
            .announce()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        log("[supervisor] Listening for messages");
        Ok(())
    }

    /// Remove the listener and cancel any pending deadline timer.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            if let Some(window) = web_sys::window() {
                let _ = window
                    .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
            }
        }
        cancel_timer(&self.timer);
        log("[supervisor] Stopped");
    }

    /// Whether no call chain is in flight.
    #[wasm_bindgen(js_name = isIdle)]
    pub fn is_idle(&self) -> bool {
        self.core.borrow().is_idle()
    }

    /// Number of frames on the call stack.
    #[wasm_bindgen(js_name = stackDepth)]
    pub fn stack_depth(&self) -> usize {
        self.core.borrow().stack_depth()
    }
}

/// Run one event through the core, then re-arm the deadline timer.
fn dispatch(core: &Shared, timer: &Timer, event: SupervisorEvent) {
    let Ok(mut supervisor) = core.try_borrow_mut() else {
        log("[supervisor] Dropping re-entrant event");
        return;
    };
    if let Outcome::Aborted(err) = supervisor.handle(event) {
        log(&format!("[supervisor] Event aborted the call chain: {err}"));
    }
    let next = supervisor.next_deadline();
    let now = supervisor.host().now_ms();
    drop(supervisor);

    cancel_timer(timer);
    if let Some(deadline) = next {
        schedule_tick(core, timer, deadline.saturating_sub(now));
    }
}

fn schedule_tick(core: &Shared, timer: &Timer, delay_ms: u64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let core_for_tick = core.clone();
    let timer_for_tick = timer.clone();
    let on_tick = Closure::once_into_js(move || {
        timer_for_tick.set(None);
        dispatch(&core_for_tick, &timer_for_tick, SupervisorEvent::Tick);
    });
    let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
    match window.set_timeout_with_callback_and_timeout_and_arguments_0(on_tick.unchecked_ref(), delay)
    {
        Ok(handle) => timer.set(Some(handle)),
        Err(e) => log(&format!("[supervisor] Failed to schedule deadline: {:?}", e)),
    }
}

fn cancel_timer(timer: &Timer) {
    if let (Some(handle), Some(window)) = (timer.take(), web_sys::window()) {
        window.clear_timeout_with_handle(handle);
    }
}
