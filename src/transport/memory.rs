//! In-process messenger used by native hosts and tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use framebridge_shared::BridgeError;

use super::{origin_matches, MessageReceiver, Messenger};

type Outbound = Rc<dyn Fn(String)>;

/// Messenger whose "other window" is a callback.
///
/// Outbound messages are recorded and handed to the peer hook; inbound
/// messages enter through [`MemoryMessenger::deliver`] together with the
/// origin they claim to come from.
pub struct MemoryMessenger {
    allowed_origin: String,
    receiver: RefCell<Option<Rc<dyn Fn(String)>>>,
    outbound: RefCell<Option<Outbound>>,
    sent: RefCell<Vec<String>>,
    closed: Cell<bool>,
}

impl MemoryMessenger {
    pub fn new(allowed_origin: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            allowed_origin: allowed_origin.into(),
            receiver: RefCell::new(None),
            outbound: RefCell::new(None),
            sent: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        })
    }

    /// Hook called with every message this side posts.
    pub fn on_outbound(&self, peer: impl Fn(String) + 'static) {
        *self.outbound.borrow_mut() = Some(Rc::new(peer));
    }

    /// Deliver an inbound message. Returns `false` if it was dropped.
    pub fn deliver(&self, origin: &str, data: impl Into<String>) -> bool {
        if self.closed.get() || !origin_matches(&self.allowed_origin, origin) {
            return false;
        }
        // Clone the callback out so it may re-enter this messenger.
        let receiver = self.receiver.borrow().clone();
        match receiver {
            Some(receiver) => {
                receiver(data.into());
                true
            }
            None => false,
        }
    }

    pub fn allowed_origin(&self) -> &str {
        &self.allowed_origin
    }

    /// Every message posted so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Messenger for MemoryMessenger {
    fn send(&self, message: &str) -> Result<(), BridgeError> {
        if self.closed.get() {
            return Err(BridgeError::Transport("messenger closed".to_string()));
        }
        self.sent.borrow_mut().push(message.to_string());
        let outbound = self.outbound.borrow().clone();
        if let Some(peer) = outbound {
            peer(message.to_string());
        }
        Ok(())
    }

    fn set_receiver(&self, receiver: MessageReceiver) {
        *self.receiver.borrow_mut() = Some(Rc::from(receiver));
    }

    fn close(&self) {
        self.closed.set(true);
        self.receiver.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_foreign_origins() {
        let messenger = MemoryMessenger::new("https://x.test");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        messenger.set_receiver(Box::new(move |msg| sink.borrow_mut().push(msg)));

        assert!(messenger.deliver("https://x.test", "hello"));
        assert!(!messenger.deliver("https://evil.test", "nope"));
        assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
    }

    #[test]
    fn closed_messenger_refuses_traffic() {
        let messenger = MemoryMessenger::new("https://x.test");
        messenger.set_receiver(Box::new(|_| {}));
        messenger.close();
        messenger.close();

        assert!(messenger.send("x").is_err());
        assert!(!messenger.deliver("https://x.test", "late"));
        assert!(messenger.sent().is_empty());
    }
}
