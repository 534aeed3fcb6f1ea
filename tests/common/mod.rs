#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use framebridge::frame::{apply_size, Frame, FrameHost, FrameRequest, RenderedFrame};
use framebridge::oauth::MemoryNavigator;
use framebridge::provider::MemoryLookup;
use framebridge::storage::MemoryStorage;
use framebridge::transport::MemoryMessenger;
use framebridge::{BridgeError, Embed, EmbedConfig, EmbedEnvironment, RemoteError};
use framebridge_shared::{
    BridgeMessage, GuestCall, GuestEnvelope, HostCall, HostEnvelope, ReplyOutcome,
    PROTOCOL_VERSION,
};
use serde_json::{json, Value};

pub const GUEST_ORIGIN: &str = "https://x.test";
pub const HOST_HREF: &str = "https://host.test/page";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Guest side of the bridge, speaking the wire protocol by hand.
///
/// Calls whose method has a scripted response are answered as soon as the
/// host posts them; the rest stay pending until [`FakeGuest::reply`].
pub struct FakeGuest {
    messenger: RefCell<Option<Rc<MemoryMessenger>>>,
    received: RefCell<Vec<BridgeMessage<GuestCall>>>,
    responses: RefCell<HashMap<&'static str, Result<Value, RemoteError>>>,
    next_id: Cell<u32>,
}

impl FakeGuest {
    pub fn new() -> Rc<Self> {
        let guest = Rc::new(Self {
            messenger: RefCell::new(None),
            received: RefCell::new(Vec::new()),
            responses: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        });
        for method in ["login", "logout", "setRoute", "setupWalletProviders", "onWalletEvent"] {
            guest.respond(method, Ok(Value::Null));
        }
        guest.respond("isAuthorized", Ok(json!(true)));
        guest
    }

    /// Listen on a freshly rendered frame's messenger.
    pub fn attach(self: &Rc<Self>, messenger: Rc<MemoryMessenger>) {
        let guest: Weak<Self> = Rc::downgrade(self);
        messenger.on_outbound(move |raw| {
            if let Some(guest) = guest.upgrade() {
                guest.receive(&raw);
            }
        });
        *self.messenger.borrow_mut() = Some(messenger);
        self.received.borrow_mut().clear();
    }

    pub fn respond(&self, method: &'static str, result: Result<Value, RemoteError>) {
        self.responses.borrow_mut().insert(method, result);
    }

    /// Leave calls to `method` unanswered.
    pub fn hold(&self, method: &'static str) {
        self.responses.borrow_mut().remove(method);
    }

    fn receive(&self, raw: &str) {
        let envelope: HostEnvelope = serde_json::from_str(raw).expect("host posted garbage");
        let message = envelope.message;
        self.received.borrow_mut().push(message.clone());

        if let BridgeMessage::Call { id, call } = message {
            let response = self.responses.borrow().get(call.method()).cloned();
            if let Some(result) = response {
                self.reply(&id, result);
            }
        }
    }

    pub fn send(&self, message: BridgeMessage<HostCall>) -> bool {
        let raw = serde_json::to_string(&GuestEnvelope::new(message)).unwrap();
        let messenger = self.messenger.borrow().clone().expect("guest not attached");
        messenger.deliver(GUEST_ORIGIN, raw)
    }

    /// Boot: the guest opens its own half of the handshake.
    pub fn handshake(&self) {
        self.send(BridgeMessage::Syn {
            version: PROTOCOL_VERSION,
        });
    }

    /// Unload, as when the guest page reloads.
    pub fn unload(&self) {
        self.send(BridgeMessage::Destroy);
    }

    pub fn reply(&self, id: &str, result: Result<Value, RemoteError>) {
        let outcome = match result {
            Ok(value) => ReplyOutcome::Fulfilled { value },
            Err(error) => ReplyOutcome::Rejected { error },
        };
        self.send(BridgeMessage::Reply {
            id: id.to_string(),
            outcome,
        });
    }

    /// Call a host method; returns the call id.
    pub fn call_host(&self, call: HostCall) -> String {
        let id = format!("guest-{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.send(BridgeMessage::Call {
            id: id.clone(),
            call,
        });
        id
    }

    /// The host's answer to call `id`, once sent.
    pub fn host_reply(&self, id: &str) -> Option<ReplyOutcome> {
        self.received.borrow().iter().find_map(|message| match message {
            BridgeMessage::Reply { id: reply_id, outcome } if reply_id == id => {
                Some(outcome.clone())
            }
            _ => None,
        })
    }

    pub fn messages(&self) -> Vec<BridgeMessage<GuestCall>> {
        self.received.borrow().clone()
    }

    /// Every call the host made, oldest first.
    pub fn calls(&self) -> Vec<(String, GuestCall)> {
        self.received
            .borrow()
            .iter()
            .filter_map(|message| match message {
                BridgeMessage::Call { id, call } => Some((id.clone(), call.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<GuestCall> {
        self.calls()
            .into_iter()
            .map(|(_, call)| call)
            .filter(|call| call.method() == method)
            .collect()
    }

    pub fn provider_notifications(&self) -> Vec<Vec<String>> {
        self.calls_to("setupWalletProviders")
            .into_iter()
            .filter_map(|call| match call {
                GuestCall::SetupWalletProviders { provider_keys } => Some(provider_keys),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryFrame {
    pub src: String,
    pub width: RefCell<Option<String>>,
    pub height: RefCell<Option<String>>,
    pub detached: Cell<bool>,
}

impl Frame for MemoryFrame {
    fn set_width(&self, css: &str) {
        *self.width.borrow_mut() = Some(css.to_string());
    }

    fn set_height(&self, css: &str) {
        *self.height.borrow_mut() = Some(css.to_string());
    }

    fn detach(&self) {
        self.detached.set(true);
    }
}

/// Renders into a fixed set of container selectors and wires each frame to
/// the fake guest.
pub struct MemoryFrameHost {
    containers: RefCell<Vec<String>>,
    guest: Rc<FakeGuest>,
    frames: RefCell<Vec<Rc<MemoryFrame>>>,
    messengers: RefCell<Vec<Rc<MemoryMessenger>>>,
}

impl MemoryFrameHost {
    pub fn new(guest: Rc<FakeGuest>, containers: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            containers: RefCell::new(containers.iter().map(|c| c.to_string()).collect()),
            guest,
            frames: RefCell::new(Vec::new()),
            messengers: RefCell::new(Vec::new()),
        })
    }

    /// Take `selector` off the page; later renders into it fail.
    pub fn remove_container(&self, selector: &str) {
        self.containers.borrow_mut().retain(|c| c != selector);
    }

    pub fn frames(&self) -> Vec<Rc<MemoryFrame>> {
        self.frames.borrow().clone()
    }

    pub fn last_frame(&self) -> Rc<MemoryFrame> {
        self.frames.borrow().last().cloned().expect("nothing rendered")
    }

    pub fn last_messenger(&self) -> Rc<MemoryMessenger> {
        self.messengers
            .borrow()
            .last()
            .cloned()
            .expect("nothing rendered")
    }
}

impl FrameHost for MemoryFrameHost {
    fn render(&self, request: FrameRequest<'_>) -> Result<RenderedFrame, BridgeError> {
        if !self
            .containers
            .borrow()
            .iter()
            .any(|c| c == request.container)
        {
            return Err(BridgeError::ContainerNotFound(request.container.to_string()));
        }

        let frame = Rc::new(MemoryFrame {
            src: request.src.to_string(),
            ..MemoryFrame::default()
        });
        apply_size(
            &*frame,
            request.size.width.as_ref(),
            request.size.height.as_ref(),
        );
        let messenger = MemoryMessenger::new(request.allowed_origin);
        self.guest.attach(messenger.clone());

        self.frames.borrow_mut().push(frame.clone());
        self.messengers.borrow_mut().push(messenger.clone());
        Ok(RenderedFrame {
            frame,
            messenger,
        })
    }
}

/// An embed over in-memory collaborators.
pub struct Harness {
    pub embed: Embed,
    pub guest: Rc<FakeGuest>,
    pub frames: Rc<MemoryFrameHost>,
    pub lookup: Rc<MemoryLookup>,
    pub storage: Rc<MemoryStorage>,
    pub navigator: Rc<MemoryNavigator>,
}

impl Harness {
    pub fn new(config: EmbedConfig) -> Self {
        Self::with_storage(config, Rc::new(MemoryStorage::new()))
    }

    /// Reuse `storage`, as a page reload after an OAuth redirect would.
    pub fn with_storage(config: EmbedConfig, storage: Rc<MemoryStorage>) -> Self {
        init_tracing();
        let guest = FakeGuest::new();
        let frames = MemoryFrameHost::new(guest.clone(), &["#c"]);
        let lookup = MemoryLookup::new();
        let navigator = MemoryNavigator::new(HOST_HREF);

        let env = EmbedEnvironment::new(
            frames.clone(),
            lookup.clone(),
            storage.clone(),
            navigator.clone(),
        );
        let embed = Embed::new(config, env).expect("valid config");

        Self {
            embed,
            guest,
            frames,
            lookup,
            storage,
            navigator,
        }
    }

    /// Run `init` to completion with a guest that handshakes.
    pub async fn ready(&self) {
        let embed = self.embed.clone();
        let init = tokio::task::spawn_local(async move { embed.init().await });
        tokio::task::yield_now().await;
        self.guest.handshake();
        init.await.unwrap().unwrap();
    }
}

pub fn config() -> EmbedConfig {
    EmbedConfig::new(GUEST_ORIGIN, "#c")
        .with_oauth_tool_url("https://oauth.test")
        .with_provider_keys(["ethereum", "okxwallet", "outer.inner"])
}
