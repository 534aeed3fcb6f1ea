//! WASM/Web messenger over `window.postMessage`.

use std::cell::{Cell, RefCell};

use framebridge_shared::BridgeError;
use wasm_bindgen::prelude::*;
use web_sys::{js_sys, MessageEvent, Window};

use super::{origin_matches, MessageReceiver, Messenger};

/// Messenger between the host window and a frame's content window.
pub struct PostMessageMessenger {
    /// Window we listen on (the embedding page)
    host: Window,
    /// Window we post to (the iframe's content window)
    target: Window,
    allowed_origin: String,
    listener: RefCell<Option<Closure<dyn FnMut(MessageEvent)>>>,
    closed: Cell<bool>,
}

impl PostMessageMessenger {
    pub fn new(host: Window, target: Window, allowed_origin: impl Into<String>) -> Self {
        Self {
            host,
            target,
            allowed_origin: allowed_origin.into(),
            listener: RefCell::new(None),
            closed: Cell::new(false),
        }
    }

    fn detach_listener(&self) {
        if let Some(listener) = self.listener.borrow_mut().take() {
            let _ = self
                .host
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
    }
}

impl Messenger for PostMessageMessenger {
    fn send(&self, message: &str) -> Result<(), BridgeError> {
        if self.closed.get() {
            return Err(BridgeError::Transport("messenger closed".to_string()));
        }
        self.target
            .post_message(&JsValue::from_str(message), &self.allowed_origin)
            .map_err(|e| BridgeError::Transport(format!("postMessage failed: {:?}", e)))
    }

    fn set_receiver(&self, receiver: MessageReceiver) {
        self.detach_listener();

        let allowed_origin = self.allowed_origin.clone();
        let target: JsValue = self.target.clone().into();
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            if !origin_matches(&allowed_origin, &event.origin()) {
                return;
            }
            if let Some(source) = event.source() {
                if !js_sys::Object::is(&source, &target) {
                    return;
                }
            }
            if let Some(text) = event.data().as_string() {
                receiver(text);
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        if let Err(e) = self
            .host
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
        {
            crate::log_error!("Failed to listen for frame messages: {:?}", e);
            return;
        }
        *self.listener.borrow_mut() = Some(listener);
    }

    fn close(&self) {
        self.closed.set(true);
        self.detach_listener();
    }
}

impl Drop for PostMessageMessenger {
    fn drop(&mut self) {
        self.detach_listener();
    }
}
