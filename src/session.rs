//! Session state and the method table the guest calls on the host.

use std::cell::RefCell;
use std::rc::Rc;

use framebridge_shared::{BridgeError, HostCall};
use futures_util::future::{ready, FutureExt};
use serde_json::{json, Value};

use crate::emitter::{EmbedEvent, EventEmitter};
use crate::events::{EventHub, SubscriptionKey};
use crate::oauth::OAuthRedirector;
use crate::provider::{ProviderRegistry, WalletProvider};
use crate::rpc::{Connection, HostMethods, HostReply};

/// Externally visible state of one embed.
#[derive(Clone, Default)]
pub struct Session {
    pub connected_address: Option<String>,
    /// Wallet used for sign-verify requests
    pub connected_provider: Option<Rc<dyn WalletProvider>>,
    /// Last route reported by the guest
    pub current_route: Option<String>,
    pub initialized: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected_address", &self.connected_address)
            .field("connected_provider", &self.connected_provider.is_some())
            .field("current_route", &self.current_route)
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Serves guest-to-host calls and owns the session fields.
pub struct SessionController {
    session: RefCell<Session>,
    registry: Rc<ProviderRegistry>,
    hub: EventHub,
    emitter: Rc<EventEmitter>,
    redirector: OAuthRedirector,
}

impl SessionController {
    pub fn new(
        registry: Rc<ProviderRegistry>,
        emitter: Rc<EventEmitter>,
        redirector: OAuthRedirector,
        current_route: Option<String>,
    ) -> Self {
        Self {
            session: RefCell::new(Session {
                current_route,
                ..Session::default()
            }),
            registry,
            hub: EventHub::new(),
            emitter,
            redirector,
        }
    }

    /// Snapshot of the session fields.
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn current_route(&self) -> Option<String> {
        self.session.borrow().current_route.clone()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.session.borrow().connected_address.clone()
    }

    pub fn registry(&self) -> &Rc<ProviderRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub(crate) fn set_initialized(&self, initialized: bool) {
        self.session.borrow_mut().initialized = initialized;
    }

    /// Replace the signing wallet and address; returns the previous pair.
    pub(crate) fn set_wallet(
        &self,
        provider: Option<Rc<dyn WalletProvider>>,
        address: Option<String>,
    ) -> (Option<Rc<dyn WalletProvider>>, Option<String>) {
        let mut session = self.session.borrow_mut();
        let previous_provider = std::mem::replace(&mut session.connected_provider, provider);
        let previous_address = std::mem::replace(&mut session.connected_address, address);
        (previous_provider, previous_address)
    }

    /// Clear every session field and detach all event forwarding.
    pub(crate) fn reset(&self) {
        *self.session.borrow_mut() = Session::default();
        self.hub.clear();
    }

    fn sign_verify(&self, message: String) -> HostReply {
        let (provider, address) = {
            let session = self.session.borrow();
            (
                session.connected_provider.clone(),
                session.connected_address.clone(),
            )
        };
        let Some(provider) = provider else {
            return ready(Err(BridgeError::MissingProvider)).boxed_local();
        };
        let Some(address) = address else {
            return ready(Err(BridgeError::MissingAddress)).boxed_local();
        };
        provider.request("personal_sign", json!([message, address]))
    }

    fn wallet_request(&self, provider_key: &str, method: &str, params: Value) -> HostReply {
        match self.registry.resolve(provider_key) {
            Some(provider) => provider.request(method, params),
            None => ready(Err(BridgeError::ProviderNotFound(provider_key.to_string()))).boxed_local(),
        }
    }

    fn subscribe(&self, key: SubscriptionKey, connection: &Connection) -> Result<Value, BridgeError> {
        let provider = self
            .registry
            .resolve(&key.provider_key)
            .ok_or_else(|| BridgeError::ProviderNotFound(key.provider_key.clone()))?;
        self.hub.subscribe(provider, key, connection.downgrade())?;
        Ok(Value::Null)
    }

    fn route_changed(&self, path: String) {
        self.session.borrow_mut().current_route = Some(path.clone());
        self.emitter.emit(&EmbedEvent::RouteChanged { path });
    }
}

impl HostMethods for SessionController {
    fn handle(&self, call: HostCall, connection: &Connection) -> HostReply {
        let done = |result: Result<(), BridgeError>| ready(result.map(|_| Value::Null)).boxed_local();

        match call {
            HostCall::RequestLogin => {
                self.emitter.emit(&EmbedEvent::LoginRequired);
                done(Ok(()))
            }
            HostCall::RequestOauth { provider, state } => {
                let route = self.current_route();
                done(self
                    .redirector
                    .redirect(&provider, &state, route.as_deref())
                    .map(|_| ()))
            }
            HostCall::RequestSignVerify { message } => self.sign_verify(message),
            HostCall::OnRouteChange { path } => {
                self.route_changed(path);
                done(Ok(()))
            }
            HostCall::OnTaskCompleted { data } => {
                self.emitter.emit(&EmbedEvent::TaskCompleted { data });
                done(Ok(()))
            }
            HostCall::RequestWalletProvider {
                provider_key,
                method,
                params,
            } => self.wallet_request(&provider_key, &method, params),
            HostCall::SubscribeWalletEvents {
                provider_key,
                event_name,
                listener_id,
            } => {
                let key = SubscriptionKey::new(provider_key, event_name, listener_id);
                ready(self.subscribe(key, connection)).boxed_local()
            }
            HostCall::UnsubscribeWalletEvents {
                provider_key,
                event_name,
                listener_id,
            } => {
                self.hub
                    .unsubscribe(&SubscriptionKey::new(provider_key, event_name, listener_id));
                done(Ok(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{MemoryNavigator, RedirectMode, SAVED_ROUTE_KEY};
    use crate::provider::{MemoryLookup, MemoryProvider};
    use crate::storage::{KeyValueStore, MemoryStorage};
    use crate::transport::MemoryMessenger;
    use framebridge_shared::RemoteError;

    struct Fixture {
        controller: Rc<SessionController>,
        connection: Connection,
        lookup: Rc<MemoryLookup>,
        storage: Rc<MemoryStorage>,
        navigator: Rc<MemoryNavigator>,
        events: Rc<RefCell<Vec<EmbedEvent>>>,
    }

    fn fixture() -> Fixture {
        let lookup = MemoryLookup::new();
        let registry = Rc::new(ProviderRegistry::new(
            lookup.clone(),
            vec!["ethereum".into(), "outer.inner".into()],
        ));
        let emitter = Rc::new(EventEmitter::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        emitter.on(move |event| sink.borrow_mut().push(event.clone()));

        let storage = Rc::new(MemoryStorage::new());
        let navigator = MemoryNavigator::new("https://host.test/");
        let redirector = OAuthRedirector::new(
            storage.clone(),
            navigator.clone(),
            Some("https://oauth.test".into()),
            "https://x.test",
            RedirectMode::Route,
        );
        let controller = Rc::new(SessionController::new(registry, emitter, redirector, None));
        let connection = Connection::connect(MemoryMessenger::new("https://x.test"), controller.clone());

        Fixture {
            controller,
            connection,
            lookup,
            storage,
            navigator,
            events,
        }
    }

    fn call(f: &Fixture, call: HostCall) -> Result<Value, BridgeError> {
        f.controller
            .handle(call, &f.connection)
            .now_or_never()
            .expect("handler completes synchronously")
    }

    #[test]
    fn route_change_updates_session_and_emits() {
        let f = fixture();
        call(&f, HostCall::OnRouteChange { path: "any thing?".into() }).unwrap();

        assert_eq!(f.controller.current_route().as_deref(), Some("any thing?"));
        assert_eq!(
            *f.events.borrow(),
            vec![EmbedEvent::RouteChanged { path: "any thing?".into() }]
        );
    }

    #[test]
    fn login_and_task_notifications() {
        let f = fixture();
        call(&f, HostCall::RequestLogin).unwrap();
        call(&f, HostCall::OnTaskCompleted { data: json!({"task": 3}) }).unwrap();

        assert_eq!(
            *f.events.borrow(),
            vec![
                EmbedEvent::LoginRequired,
                EmbedEvent::TaskCompleted { data: json!({"task": 3}) }
            ]
        );
    }

    #[test]
    fn sign_verify_needs_provider_then_address() {
        let f = fixture();
        let sign = || HostCall::RequestSignVerify { message: "0x68656c6c6f".into() };

        assert_eq!(call(&f, sign()), Err(BridgeError::MissingProvider));

        let wallet = MemoryProvider::new();
        wallet.respond("personal_sign", Ok(json!("0xsig")));
        f.controller.set_wallet(Some(wallet.clone()), None);
        assert_eq!(call(&f, sign()), Err(BridgeError::MissingAddress));

        f.controller.set_wallet(Some(wallet.clone()), Some("0xabc".into()));
        assert_eq!(call(&f, sign()), Ok(json!("0xsig")));
        assert_eq!(
            wallet.requests(),
            vec![("personal_sign".to_string(), json!(["0x68656c6c6f", "0xabc"]))]
        );
    }

    #[test]
    fn wallet_request_resolves_dotted_keys() {
        let f = fixture();
        let outer = MemoryProvider::new();
        f.lookup.insert("outer", outer.clone());
        let request = || HostCall::RequestWalletProvider {
            provider_key: "outer.inner".into(),
            method: "eth_chainId".into(),
            params: Value::Null,
        };

        assert_eq!(
            call(&f, request()),
            Err(BridgeError::ProviderNotFound("outer.inner".into()))
        );

        let inner = MemoryProvider::new();
        inner.respond("eth_chainId", Ok(json!("0x1")));
        outer.add_child("inner", inner);
        assert_eq!(call(&f, request()), Ok(json!("0x1")));
    }

    #[test]
    fn wallet_request_passes_provider_rejection_through() {
        let f = fixture();
        let wallet = MemoryProvider::new();
        wallet.respond(
            "eth_sendTransaction",
            Err(RemoteError::new("User rejected").with_code("4001")),
        );
        f.lookup.insert("ethereum", wallet);

        let err = call(
            &f,
            HostCall::RequestWalletProvider {
                provider_key: "ethereum".into(),
                method: "eth_sendTransaction".into(),
                params: json!([{}]),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Remote(RemoteError::new("User rejected").with_code("4001"))
        );
    }

    #[test]
    fn subscribe_unknown_provider_fails() {
        let f = fixture();
        let err = call(
            &f,
            HostCall::SubscribeWalletEvents {
                provider_key: "ethereum".into(),
                event_name: "chainChanged".into(),
                listener_id: "L1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, BridgeError::ProviderNotFound("ethereum".into()));
    }

    #[test]
    fn subscribe_then_unsubscribe_leaves_no_handler() {
        let f = fixture();
        let wallet = MemoryProvider::new();
        f.lookup.insert("ethereum", wallet.clone());
        let (provider_key, event_name, listener_id) =
            ("ethereum".to_string(), "chainChanged".to_string(), "L1".to_string());

        call(
            &f,
            HostCall::SubscribeWalletEvents {
                provider_key: provider_key.clone(),
                event_name: event_name.clone(),
                listener_id: listener_id.clone(),
            },
        )
        .unwrap();
        assert_eq!(wallet.listener_count("chainChanged"), 1);

        for _ in 0..2 {
            call(
                &f,
                HostCall::UnsubscribeWalletEvents {
                    provider_key: provider_key.clone(),
                    event_name: event_name.clone(),
                    listener_id: listener_id.clone(),
                },
            )
            .unwrap();
        }
        assert_eq!(wallet.listener_count("chainChanged"), 0);
        assert!(f.controller.hub().is_empty());
    }

    #[test]
    fn oauth_uses_reported_route() {
        let f = fixture();
        call(&f, HostCall::OnRouteChange { path: "/quests/2".into() }).unwrap();
        call(
            &f,
            HostCall::RequestOauth {
                provider: "twitter".into(),
                state: "state123".into(),
            },
        )
        .unwrap();

        assert_eq!(f.storage.get(SAVED_ROUTE_KEY).as_deref(), Some("/quests/2"));
        assert_eq!(
            f.navigator.visited(),
            vec!["https://oauth.test/twitter?state=state123&from=https%3A%2F%2Fhost.test%2F"]
        );
    }

    #[test]
    fn oauth_rejects_unknown_provider() {
        let f = fixture();
        let err = call(
            &f,
            HostCall::RequestOauth {
                provider: "myspace".into(),
                state: "s".into(),
            },
        )
        .unwrap_err();

        assert_eq!(err, BridgeError::InvalidProvider("myspace".into()));
        assert!(f.storage.is_empty());
        assert!(f.navigator.visited().is_empty());
    }

    #[test]
    fn reset_clears_session() {
        let f = fixture();
        f.controller
            .set_wallet(Some(MemoryProvider::new()), Some("0xabc".into()));
        f.controller.set_initialized(true);
        call(&f, HostCall::OnRouteChange { path: "/a".into() }).unwrap();

        f.controller.reset();
        let session = f.controller.session();
        assert!(session.connected_provider.is_none());
        assert!(session.connected_address.is_none());
        assert!(session.current_route.is_none());
        assert!(!session.initialized);
    }
}
