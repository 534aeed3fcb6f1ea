//! Host-visible notifications.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

/// Notification raised towards the integrator.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedEvent {
    /// The guest wants the integrator to start a login.
    LoginRequired,
    RouteChanged { path: String },
    TaskCompleted { data: Value },
}

impl EmbedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EmbedEvent::LoginRequired => "loginRequired",
            EmbedEvent::RouteChanged { .. } => "routeChanged",
            EmbedEvent::TaskCompleted { .. } => "taskCompleted",
        }
    }
}

/// Returned by [`EventEmitter::on`]; pass to [`EventEmitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

type Listener = Rc<dyn Fn(&EmbedEvent)>;

#[derive(Default)]
pub struct EventEmitter {
    listeners: RefCell<Vec<(ListenerToken, Listener)>>,
    next_id: Cell<u64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: impl Fn(&EmbedEvent) + 'static) -> ListenerToken {
        let token = ListenerToken(self.next_id.get());
        self.next_id.set(token.0 + 1);
        self.listeners.borrow_mut().push((token, Rc::new(listener)));
        token
    }

    pub fn off(&self, token: ListenerToken) {
        self.listeners.borrow_mut().retain(|(t, _)| *t != token);
    }

    pub fn emit(&self, event: &EmbedEvent) {
        // Listeners may call on/off while we iterate.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        crate::log_debug!("emit {}", event.name());
        for listener in listeners {
            listener(event);
        }
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}
