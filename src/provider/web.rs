//! WASM/Web providers read from the page's global scope.

use std::cell::RefCell;
use std::rc::Rc;

use framebridge_shared::{BridgeError, RemoteError};
use futures_util::FutureExt;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{self, Array, Function, Object, Promise, Reflect};

use super::{EventListener, ProviderLookup, ProviderRequest, WalletProvider};

/// A listener installed on the JS object, kept alive until removed.
struct Installed {
    event: String,
    listener: EventListener,
    /// Variadic wrapper actually registered with the provider
    wrapper: Function,
    _closure: Closure<dyn FnMut(Array)>,
}

/// Provider backed by a JS object implementing EIP-1193.
pub struct JsProvider {
    object: JsValue,
    installed: RefCell<Vec<Installed>>,
}

impl JsProvider {
    pub fn new(object: JsValue) -> Self {
        Self {
            object,
            installed: RefCell::new(Vec::new()),
        }
    }

    fn function(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.object, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }
}

impl WalletProvider for JsProvider {
    fn request(&self, method: &str, params: Value) -> ProviderRequest {
        let object = self.object.clone();
        let request = self.function("request");
        let method = method.to_string();

        async move {
            let request = request.ok_or_else(|| {
                BridgeError::Transport("provider has no request method".to_string())
            })?;

            let args = Object::new();
            Reflect::set(&args, &"method".into(), &JsValue::from_str(&method)).map_err(js_error)?;
            if !params.is_null() {
                Reflect::set(&args, &"params".into(), &to_js(&params)?).map_err(js_error)?;
            }

            let returned = request.call1(&object, &args).map_err(js_error)?;
            let settled = JsFuture::from(Promise::resolve(&returned))
                .await
                .map_err(js_error)?;
            from_js(&settled)
        }
        .boxed_local()
    }

    fn supports_events(&self) -> bool {
        self.function("on").is_some() && self.function("removeListener").is_some()
    }

    fn on(&self, event: &str, listener: EventListener) -> Result<(), BridgeError> {
        let on = self
            .function("on")
            .ok_or_else(|| BridgeError::Transport("provider has no on method".to_string()))?;

        let forward = listener.clone();
        let closure = Closure::wrap(Box::new(move |args: Array| {
            let values = args
                .iter()
                .map(|arg| from_js(&arg).unwrap_or(Value::Null))
                .collect();
            forward(values);
        }) as Box<dyn FnMut(Array)>);

        // Collect every argument, not just the first.
        let factory = Function::new_with_args(
            "cb",
            "return function() { cb(Array.prototype.slice.call(arguments)); };",
        );
        let wrapper: Function = factory
            .call1(&JsValue::NULL, closure.as_ref())
            .map_err(js_error)?
            .dyn_into()
            .map_err(js_error)?;

        on.call2(&self.object, &JsValue::from_str(event), &wrapper)
            .map_err(js_error)?;

        self.installed.borrow_mut().push(Installed {
            event: event.to_string(),
            listener,
            wrapper,
            _closure: closure,
        });
        Ok(())
    }

    fn remove_listener(&self, event: &str, listener: &EventListener) {
        let position = self
            .installed
            .borrow()
            .iter()
            .position(|i| i.event == event && Rc::ptr_eq(&i.listener, listener));
        let Some(position) = position else {
            return;
        };
        let installed = self.installed.borrow_mut().remove(position);
        if let Some(remove) = self.function("removeListener") {
            if let Err(e) = remove.call2(
                &self.object,
                &JsValue::from_str(event),
                &installed.wrapper,
            ) {
                crate::log_warn!("removeListener failed: {:?}", e);
            }
        }
    }

    fn child(&self, name: &str) -> Option<Rc<dyn WalletProvider>> {
        let value = Reflect::get(&self.object, &JsValue::from_str(name)).ok()?;
        if !value.is_object() {
            return None;
        }
        Some(Rc::new(JsProvider::new(value)))
    }
}

/// Lookup over `window`'s own properties.
pub struct WindowProviderLookup {
    window: web_sys::Window,
}

impl WindowProviderLookup {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

impl ProviderLookup for WindowProviderLookup {
    fn root(&self, name: &str) -> Option<Rc<dyn WalletProvider>> {
        let value = Reflect::get(&self.window, &JsValue::from_str(name)).ok()?;
        if !value.is_object() {
            return None;
        }
        Some(Rc::new(JsProvider::new(value)))
    }
}

fn to_js(value: &Value) -> Result<JsValue, BridgeError> {
    let json = serde_json::to_string(value)?;
    js_sys::JSON::parse(&json).map_err(js_error)
}

fn from_js(value: &JsValue) -> Result<Value, BridgeError> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let json: String = js_sys::JSON::stringify(value).map_err(js_error)?.into();
    Ok(serde_json::from_str(&json)?)
}

/// Map a thrown JS value (usually `{ code, message }`) to a remote error.
fn js_error(value: JsValue) -> BridgeError {
    let message = Reflect::get(&value, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value));
    let code = Reflect::get(&value, &"code".into()).ok().and_then(|c| {
        c.as_string()
            .or_else(|| c.as_f64().map(|n| (n as i64).to_string()))
    });
    BridgeError::Remote(RemoteError { code, message })
}
