//! Forwarding of wallet provider events to the guest.
//!
//! The guest subscribes with `(providerKey, eventName, listenerId)`. Each
//! triple owns exactly one handler on the underlying provider; every time
//! the provider fires, the handler relays the arguments untouched through
//! `onWalletEvent`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use framebridge_shared::BridgeError;
use serde_json::Value;

use crate::platform;
use crate::provider::{EventListener, WalletProvider};
use crate::rpc::{GuestProxy, WeakConnection};

/// Identity of one guest subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    pub provider_key: String,
    pub event_name: String,
    pub listener_id: String,
}

impl SubscriptionKey {
    pub fn new(
        provider_key: impl Into<String>,
        event_name: impl Into<String>,
        listener_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_key: provider_key.into(),
            event_name: event_name.into(),
            listener_id: listener_id.into(),
        }
    }
}

struct Subscription {
    provider: Rc<dyn WalletProvider>,
    listener: EventListener,
}

impl Subscription {
    fn detach(&self, event_name: &str) {
        self.provider.remove_listener(event_name, &self.listener);
    }
}

#[derive(Default)]
pub struct EventHub {
    subscriptions: RefCell<HashMap<SubscriptionKey, Subscription>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a forwarding handler for `key` on `provider`.
    ///
    /// A second subscribe with the same key replaces the first handler, so
    /// each event firing is forwarded once. The old handler stays attached
    /// if the new one cannot be installed. Providers without events are
    /// left alone.
    pub fn subscribe(
        &self,
        provider: Rc<dyn WalletProvider>,
        key: SubscriptionKey,
        connection: WeakConnection,
    ) -> Result<(), BridgeError> {
        if !provider.supports_events() {
            crate::log_debug!("Provider {} has no events, ignoring subscribe", key.provider_key);
            return Ok(());
        }

        let listener = forwarder(key.clone(), connection);
        provider.on(&key.event_name, listener.clone())?;
        crate::log_debug!(
            "Forwarding {}:{} to listener {}",
            key.provider_key,
            key.event_name,
            key.listener_id
        );
        let replaced = self
            .subscriptions
            .borrow_mut()
            .insert(key.clone(), Subscription { provider, listener });
        if let Some(old) = replaced {
            old.detach(&key.event_name);
        }
        Ok(())
    }

    /// Detach the handler for `key`. Unknown keys are a no-op.
    pub fn unsubscribe(&self, key: &SubscriptionKey) {
        let removed = self.subscriptions.borrow_mut().remove(key);
        if let Some(subscription) = removed {
            subscription.detach(&key.event_name);
        }
    }

    /// Detach every handler.
    pub fn clear(&self) {
        let drained: Vec<_> = self.subscriptions.borrow_mut().drain().collect();
        for (key, subscription) in drained {
            subscription.detach(&key.event_name);
        }
    }

    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }
}

/// Handler relaying one provider event to the guest.
///
/// A failed relay is logged; the subscription stays in place.
fn forwarder(key: SubscriptionKey, connection: WeakConnection) -> EventListener {
    Rc::new(move |args: Vec<Value>| {
        let Some(connection) = connection.upgrade() else {
            return;
        };
        let relay = GuestProxy::new(connection).on_wallet_event(
            &key.provider_key,
            &key.event_name,
            &key.listener_id,
            args,
        );
        let key = key.clone();
        platform::spawn_local(async move {
            if let Err(e) = relay.await {
                crate::log_warn!(
                    "Failed to forward {}:{} to listener {}: {}",
                    key.provider_key,
                    key.event_name,
                    key.listener_id,
                    e
                );
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use crate::rpc::{Connection, HostMethods, HostReply};
    use crate::transport::MemoryMessenger;
    use framebridge_shared::{
        BridgeMessage, GuestCall, GuestEnvelope, HostCall, HostEnvelope, PROTOCOL_VERSION,
    };
    use futures_util::FutureExt;
    use serde_json::json;

    const ORIGIN: &str = "https://x.test";

    struct NoMethods;

    impl HostMethods for NoMethods {
        fn handle(&self, _call: HostCall, _connection: &Connection) -> HostReply {
            async { Ok(Value::Null) }.boxed_local()
        }
    }

    fn ready_connection() -> (Connection, Rc<MemoryMessenger>) {
        let messenger = MemoryMessenger::new(ORIGIN);
        let connection = Connection::connect(messenger.clone(), Rc::new(NoMethods));
        let ack = GuestEnvelope::new(BridgeMessage::<HostCall>::Ack {
            version: PROTOCOL_VERSION,
        });
        messenger.deliver(ORIGIN, serde_json::to_string(&ack).unwrap());
        assert!(connection.is_ready());
        (connection, messenger)
    }

    fn forwarded(messenger: &MemoryMessenger) -> Vec<GuestCall> {
        messenger
            .sent()
            .iter()
            .filter_map(|raw| match serde_json::from_str::<HostEnvelope>(raw).unwrap().message {
                BridgeMessage::Call {
                    call: call @ GuestCall::OnWalletEvent { .. },
                    ..
                } => Some(call),
                _ => None,
            })
            .collect()
    }

    fn key() -> SubscriptionKey {
        SubscriptionKey::new("ethereum", "accountsChanged", "L1")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn duplicate_subscribe_forwards_once() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (connection, messenger) = ready_connection();
                let provider = MemoryProvider::new();
                let hub = EventHub::new();

                hub.subscribe(provider.clone(), key(), connection.downgrade())
                    .unwrap();
                hub.subscribe(provider.clone(), key(), connection.downgrade())
                    .unwrap();
                assert_eq!(provider.listener_count("accountsChanged"), 1);
                assert_eq!(hub.len(), 1);

                provider.emit("accountsChanged", vec![json!(["0xabc"]), json!(1)]);
                assert_eq!(
                    forwarded(&messenger),
                    vec![GuestCall::OnWalletEvent {
                        provider_key: "ethereum".into(),
                        event_name: "accountsChanged".into(),
                        listener_id: "L1".into(),
                        args: vec![json!(["0xabc"]), json!(1)],
                    }]
                );
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refused_resubscribe_keeps_working_handler() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (connection, messenger) = ready_connection();
                let provider = MemoryProvider::new();
                let hub = EventHub::new();
                hub.subscribe(provider.clone(), key(), connection.downgrade())
                    .unwrap();

                provider.refuse_listeners(true);
                let err = hub
                    .subscribe(provider.clone(), key(), connection.downgrade())
                    .unwrap_err();
                assert!(matches!(err, BridgeError::Transport(_)));
                assert!(hub.is_subscribed(&key()));
                assert_eq!(provider.listener_count("accountsChanged"), 1);

                provider.emit("accountsChanged", vec![json!(["0xabc"])]);
                assert_eq!(forwarded(&messenger).len(), 1);
            })
            .await;
    }

    #[test]
    fn unsubscribe_detaches_and_is_idempotent() {
        let (connection, _messenger) = ready_connection();
        let provider = MemoryProvider::new();
        let hub = EventHub::new();

        hub.subscribe(provider.clone(), key(), connection.downgrade())
            .unwrap();
        hub.unsubscribe(&key());
        assert_eq!(provider.listener_count("accountsChanged"), 0);
        assert!(!hub.is_subscribed(&key()));

        hub.unsubscribe(&key());
        assert!(hub.is_empty());
    }

    #[test]
    fn distinct_listener_ids_do_not_collide() {
        let (connection, _messenger) = ready_connection();
        let provider = MemoryProvider::new();
        let hub = EventHub::new();

        hub.subscribe(provider.clone(), key(), connection.downgrade())
            .unwrap();
        hub.subscribe(
            provider.clone(),
            SubscriptionKey::new("ethereum", "accountsChanged", "L2"),
            connection.downgrade(),
        )
        .unwrap();
        assert_eq!(provider.listener_count("accountsChanged"), 2);

        hub.unsubscribe(&key());
        assert_eq!(provider.listener_count("accountsChanged"), 1);

        hub.clear();
        assert_eq!(provider.listener_count("accountsChanged"), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn providers_without_events_are_skipped() {
        let (connection, _messenger) = ready_connection();
        let provider = MemoryProvider::without_events();
        let hub = EventHub::new();

        assert!(hub
            .subscribe(provider, key(), connection.downgrade())
            .is_ok());
        assert!(hub.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_forward_keeps_subscription() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (connection, messenger) = ready_connection();
                let provider = MemoryProvider::new();
                let hub = EventHub::new();
                hub.subscribe(provider.clone(), key(), connection.downgrade())
                    .unwrap();

                // Guest unloads: forwarding now fails with "not initialized".
                let destroy = GuestEnvelope::new(BridgeMessage::<HostCall>::Destroy);
                messenger.deliver(ORIGIN, serde_json::to_string(&destroy).unwrap());
                provider.emit("accountsChanged", vec![json!([])]);
                tokio::task::yield_now().await;

                assert!(forwarded(&messenger).is_empty());
                assert!(hub.is_subscribed(&key()));
                assert_eq!(provider.listener_count("accountsChanged"), 1);
            })
            .await;
    }
}
