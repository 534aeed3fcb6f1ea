//! Bridge connection with handshake and call bookkeeping.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use framebridge_shared::{
    BridgeError, BridgeMessage, GuestCall, GuestEnvelope, HostEnvelope, ReplyOutcome,
    PROTOCOL_VERSION,
};
use futures_channel::oneshot;
use serde_json::Value;

use super::{GuestProxy, HostMethods};
use crate::platform;
use crate::transport::Messenger;

/// Connection state for the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Handshaking,
    Ready,
    Destroyed,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, ConnectionState::Destroyed)
    }
}

type PendingReply = oneshot::Sender<Result<Value, BridgeError>>;
type ReadyWaiter = oneshot::Sender<Result<(), BridgeError>>;

struct Inner {
    state: Cell<ConnectionState>,
    messenger: Rc<dyn Messenger>,
    methods: Rc<dyn HostMethods>,
    /// Host-to-guest calls awaiting a reply, keyed by call id
    pending: RefCell<HashMap<String, PendingReply>>,
    ready_waiters: RefCell<Vec<ReadyWaiter>>,
    /// Why the connection was torn down, if not by `destroy()`
    failure: RefCell<Option<BridgeError>>,
}

/// One bridge to one guest frame.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<Inner>,
}

/// Non-owning handle, for callbacks stored in objects the connection owns.
#[derive(Clone)]
pub struct WeakConnection {
    inner: Weak<Inner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

impl Connection {
    /// Start the handshake over `messenger`, exposing `methods` to the guest.
    ///
    /// Never blocks; await [`Connection::ready`] for the remote proxy.
    pub fn connect(messenger: Rc<dyn Messenger>, methods: Rc<dyn HostMethods>) -> Self {
        let connection = Self {
            inner: Rc::new(Inner {
                state: Cell::new(ConnectionState::Unconnected),
                messenger,
                methods,
                pending: RefCell::new(HashMap::new()),
                ready_waiters: RefCell::new(Vec::new()),
                failure: RefCell::new(None),
            }),
        };

        let weak = connection.downgrade();
        connection
            .inner
            .messenger
            .set_receiver(Box::new(move |raw: String| {
                if let Some(connection) = weak.upgrade() {
                    connection.receive(&raw);
                }
            }));

        connection.inner.state.set(ConnectionState::Handshaking);
        // The guest may not have booted yet; it sends its own syn when it does.
        if let Err(e) = connection.post(BridgeMessage::Syn {
            version: PROTOCOL_VERSION,
        }) {
            crate::log_debug!("Initial syn not delivered: {}", e);
        }

        connection
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Whether both handles belong to the same bridge.
    pub fn same_as(&self, other: &Connection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Number of host-to-guest calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Resolves with the guest proxy once the handshake completes.
    pub fn ready(&self) -> impl Future<Output = Result<GuestProxy, BridgeError>> + 'static {
        let waiter = match self.state() {
            ConnectionState::Ready => Ok(None),
            ConnectionState::Destroyed => Err(self.failure()),
            ConnectionState::Unconnected | ConnectionState::Handshaking => {
                let (tx, rx) = oneshot::channel();
                self.inner.ready_waiters.borrow_mut().push(tx);
                Ok(Some(rx))
            }
        };
        let connection = self.clone();

        async move {
            if let Some(rx) = waiter? {
                rx.await.unwrap_or(Err(BridgeError::ConnectionDestroyed))?;
            }
            Ok(GuestProxy::new(connection))
        }
    }

    /// Call a guest method.
    ///
    /// The message is posted before this returns; the future only waits for
    /// the reply. There is no timeout: a guest that never answers keeps the
    /// future pending until [`Connection::destroy`].
    pub fn call(&self, call: GuestCall) -> impl Future<Output = Result<Value, BridgeError>> + 'static {
        let reply = self.dispatch(call);
        async move { reply?.await.unwrap_or(Err(BridgeError::ConnectionDestroyed)) }
    }

    fn dispatch(
        &self,
        call: GuestCall,
    ) -> Result<oneshot::Receiver<Result<Value, BridgeError>>, BridgeError> {
        match self.state() {
            ConnectionState::Ready => {}
            ConnectionState::Destroyed => return Err(self.failure()),
            ConnectionState::Unconnected | ConnectionState::Handshaking => {
                return Err(BridgeError::NotInitialized)
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.borrow_mut().insert(id.clone(), tx);

        crate::log_debug!("-> {} ({})", call.method(), id);
        if let Err(e) = self.post(BridgeMessage::Call {
            id: id.clone(),
            call,
        }) {
            self.inner.pending.borrow_mut().remove(&id);
            return Err(e);
        }
        Ok(rx)
    }

    /// Tear the connection down. Idempotent.
    ///
    /// Outstanding calls and readiness waiters fail with
    /// [`BridgeError::ConnectionDestroyed`].
    pub fn destroy(&self) {
        if self.state().is_destroyed() {
            return;
        }
        if let Err(e) = self.post(BridgeMessage::Destroy) {
            crate::log_debug!("Guest not told about teardown: {}", e);
        }
        self.teardown(BridgeError::ConnectionDestroyed);
        crate::log_info!("Bridge connection destroyed");
    }

    fn failure(&self) -> BridgeError {
        self.inner
            .failure
            .borrow()
            .clone()
            .unwrap_or(BridgeError::ConnectionDestroyed)
    }

    fn post(&self, message: BridgeMessage<GuestCall>) -> Result<(), BridgeError> {
        let json = serde_json::to_string(&HostEnvelope::new(message))?;
        self.inner.messenger.send(&json)
    }

    fn receive(&self, raw: &str) {
        if self.state().is_destroyed() {
            return;
        }

        let envelope: GuestEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                crate::log_debug!("Ignoring non-bridge message: {}", e);
                return;
            }
        };
        if !envelope.is_ours() {
            return;
        }

        match envelope.message {
            BridgeMessage::Syn { version } => {
                if self.accept_version(version) {
                    if let Err(e) = self.post(BridgeMessage::Ack {
                        version: PROTOCOL_VERSION,
                    }) {
                        crate::log_warn!("Failed to acknowledge guest handshake: {}", e);
                    }
                    self.mark_ready();
                }
            }
            BridgeMessage::Ack { version } => {
                if self.accept_version(version) {
                    self.mark_ready();
                }
            }
            BridgeMessage::Call { id, call } => self.handle_call(id, call),
            BridgeMessage::Reply { id, outcome } => self.settle(&id, outcome),
            BridgeMessage::Destroy => self.reset(),
        }
    }

    fn accept_version(&self, version: u32) -> bool {
        if version == PROTOCOL_VERSION {
            return true;
        }
        let error = BridgeError::ProtocolMismatch {
            host: PROTOCOL_VERSION,
            guest: version,
        };
        crate::log_error!("{}", error);
        *self.inner.failure.borrow_mut() = Some(error.clone());
        self.teardown(error);
        false
    }

    fn mark_ready(&self) {
        if self.state() != ConnectionState::Handshaking {
            return;
        }
        self.inner.state.set(ConnectionState::Ready);
        crate::log_info!("Bridge handshake complete");

        let waiters = std::mem::take(&mut *self.inner.ready_waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }
    }

    fn handle_call(&self, id: String, call: framebridge_shared::HostCall) {
        if !self.is_ready() {
            self.reply(&id, Err(BridgeError::NotInitialized));
            return;
        }

        crate::log_debug!("<- {} ({})", call.method(), id);
        let methods = self.inner.methods.clone();
        let reply = methods.handle(call, self);

        let connection = self.downgrade();
        platform::spawn_local(async move {
            let result = reply.await;
            match connection.upgrade() {
                Some(connection) if !connection.state().is_destroyed() => {
                    connection.reply(&id, result)
                }
                _ => crate::log_debug!("Dropping reply to {}: connection gone", id),
            }
        });
    }

    fn reply(&self, id: &str, result: Result<Value, BridgeError>) {
        let outcome = match result {
            Ok(value) => ReplyOutcome::Fulfilled { value },
            Err(e) => {
                crate::log_debug!("Guest call {} failed: {}", id, e);
                ReplyOutcome::Rejected {
                    error: e.to_remote(),
                }
            }
        };
        if let Err(e) = self.post(BridgeMessage::Reply {
            id: id.to_string(),
            outcome,
        }) {
            crate::log_warn!("Failed to reply to guest call {}: {}", id, e);
        }
    }

    fn settle(&self, id: &str, outcome: ReplyOutcome) {
        let sender = self.inner.pending.borrow_mut().remove(id);
        let Some(sender) = sender else {
            crate::log_debug!("Reply for unknown call {}", id);
            return;
        };
        let result = match outcome {
            ReplyOutcome::Fulfilled { value } => Ok(value),
            ReplyOutcome::Rejected { error } => Err(BridgeError::Remote(error)),
        };
        let _ = sender.send(result);
    }

    /// The guest unloaded; its replies will never come. A reloaded guest
    /// handshakes again.
    fn reset(&self) {
        crate::log_info!("Guest went away, waiting for a new handshake");
        if self.state().is_ready() {
            self.inner.state.set(ConnectionState::Handshaking);
        }
        self.fail_pending(&BridgeError::ConnectionDestroyed);
    }

    fn teardown(&self, error: BridgeError) {
        self.inner.state.set(ConnectionState::Destroyed);
        self.inner.messenger.close();
        self.fail_pending(&error);

        let waiters = std::mem::take(&mut *self.inner.ready_waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn fail_pending(&self, error: &BridgeError) {
        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        for (_, sender) in pending {
            let _ = sender.send(Err(error.clone()));
        }
    }
}
