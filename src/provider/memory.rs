//! In-memory providers for native hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use framebridge_shared::{BridgeError, RemoteError};
use futures_util::FutureExt;
use serde_json::Value;

use super::{EventListener, ProviderLookup, ProviderRequest, WalletProvider};

/// Provider with scripted responses and manually emitted events.
pub struct MemoryProvider {
    responses: RefCell<HashMap<String, Result<Value, RemoteError>>>,
    requests: RefCell<Vec<(String, Value)>>,
    listeners: RefCell<Vec<(String, EventListener)>>,
    children: RefCell<HashMap<String, Rc<dyn WalletProvider>>>,
    events: bool,
    refuse_listeners: Cell<bool>,
}

impl MemoryProvider {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::build(true))
    }

    /// A provider without `on`/`removeListener`.
    pub fn without_events() -> Rc<Self> {
        Rc::new(Self::build(false))
    }

    fn build(events: bool) -> Self {
        Self {
            responses: RefCell::new(HashMap::new()),
            requests: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            children: RefCell::new(HashMap::new()),
            events,
            refuse_listeners: Cell::new(false),
        }
    }

    /// Script the result of `method`.
    pub fn respond(&self, method: &str, result: Result<Value, RemoteError>) {
        self.responses
            .borrow_mut()
            .insert(method.to_string(), result);
    }

    pub fn add_child(&self, name: &str, child: Rc<dyn WalletProvider>) {
        self.children.borrow_mut().insert(name.to_string(), child);
    }

    /// Make later `on` calls fail, as a locked wallet might.
    pub fn refuse_listeners(&self, refuse: bool) {
        self.refuse_listeners.set(refuse);
    }

    /// Fire `event` with `args` to every attached listener.
    pub fn emit(&self, event: &str, args: Vec<Value>) {
        let listeners: Vec<EventListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(args.clone());
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.borrow().clone()
    }
}

impl WalletProvider for MemoryProvider {
    fn request(&self, method: &str, params: Value) -> ProviderRequest {
        self.requests
            .borrow_mut()
            .push((method.to_string(), params));
        let result = self
            .responses
            .borrow()
            .get(method)
            .cloned()
            .unwrap_or_else(|| {
                Err(RemoteError::new(format!("method {method} not supported")).with_code("4200"))
            });
        async move { result.map_err(BridgeError::Remote) }.boxed_local()
    }

    fn supports_events(&self) -> bool {
        self.events
    }

    fn on(&self, event: &str, listener: EventListener) -> Result<(), BridgeError> {
        if !self.events {
            return Err(BridgeError::Transport("provider has no event support".into()));
        }
        if self.refuse_listeners.get() {
            return Err(BridgeError::Transport(format!("listener for {event} refused")));
        }
        self.listeners
            .borrow_mut()
            .push((event.to_string(), listener));
        Ok(())
    }

    fn remove_listener(&self, event: &str, listener: &EventListener) {
        self.listeners
            .borrow_mut()
            .retain(|(name, existing)| !(name == event && Rc::ptr_eq(existing, listener)));
    }

    fn child(&self, name: &str) -> Option<Rc<dyn WalletProvider>> {
        self.children.borrow().get(name).cloned()
    }
}

/// Global scope stand-in: providers may be inserted at any time to model
/// late injection by an extension.
#[derive(Default)]
pub struct MemoryLookup {
    roots: RefCell<HashMap<String, Rc<dyn WalletProvider>>>,
}

impl MemoryLookup {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn insert(&self, name: &str, provider: Rc<dyn WalletProvider>) {
        self.roots.borrow_mut().insert(name.to_string(), provider);
    }

    pub fn remove(&self, name: &str) {
        self.roots.borrow_mut().remove(name);
    }
}

impl ProviderLookup for MemoryLookup {
    fn root(&self, name: &str) -> Option<Rc<dyn WalletProvider>> {
        self.roots.borrow().get(name).cloned()
    }
}
