//! The object an integrator holds.
//!
//! ```text
//! Constructed ─init─▶ IframeRendered ─▶ Handshaking ─▶ Ready
//!      └──────────────────────┴──────────────┴───────────┴──destroy─▶ Destroyed
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use framebridge_shared::{AuthType, BridgeError, LoginRequest, LogoutOptions};

use crate::config::EmbedConfig;
use crate::emitter::{EmbedEvent, EventEmitter, ListenerToken};
use crate::frame::{apply_size, Dimension, Frame, FrameHost, FrameRequest, FrameSize};
use crate::oauth::{take_saved_route, Navigator, OAuthRedirector, SavedRoute};
use crate::provider::{ProviderLookup, ProviderRegistry, ProviderWatcher, WalletProvider};
use crate::rpc::{Connection, GuestProxy};
use crate::session::{Session, SessionController};
use crate::signer::LoginSigner;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
    Constructed,
    IframeRendered,
    Handshaking,
    Ready,
    Destroyed,
}

/// Host-page collaborators the embed runs against.
#[derive(Clone)]
pub struct EmbedEnvironment {
    pub frame_host: Rc<dyn FrameHost>,
    pub lookup: Rc<dyn ProviderLookup>,
    pub storage: Rc<dyn KeyValueStore>,
    pub navigator: Rc<dyn Navigator>,
}

impl EmbedEnvironment {
    pub fn new(
        frame_host: Rc<dyn FrameHost>,
        lookup: Rc<dyn ProviderLookup>,
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        Self {
            frame_host,
            lookup,
            storage,
            navigator,
        }
    }

    /// The current page: DOM frames, `window` providers, `localStorage`
    /// and `window.location`.
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Result<Self, BridgeError> {
        let window =
            web_sys::window().ok_or_else(|| BridgeError::Transport("no window".to_string()))?;
        Ok(Self::new(
            Rc::new(crate::frame::DomFrameHost),
            Rc::new(crate::provider::WindowProviderLookup::new(window)),
            Rc::new(crate::storage::LocalStorage::new()),
            Rc::new(crate::oauth::WindowNavigator),
        ))
    }
}

/// Parameters of [`Embed::login`].
#[derive(Clone)]
pub struct LoginParams {
    pub request: LoginRequest,
    /// Wallet that will answer sign-verify requests
    pub provider: Option<Rc<dyn WalletProvider>>,
    /// Registry key to resolve the wallet from, when `provider` is unset
    pub provider_key: Option<String>,
}

impl LoginParams {
    pub fn new(kind: AuthType, account: impl Into<String>) -> Self {
        Self::from(LoginRequest {
            kind,
            account: account.into(),
            signature: None,
            timestamp: None,
        })
    }

    /// Sign the login with `signer`.
    pub fn signed(
        signer: &dyn LoginSigner,
        kind: AuthType,
        account: &str,
        secret: &str,
    ) -> Result<Self, BridgeError> {
        Ok(Self::from(signer.login_request(kind, account, secret)?))
    }

    pub fn with_signature(mut self, signature: impl Into<String>, timestamp: i64) -> Self {
        self.request.signature = Some(signature.into());
        self.request.timestamp = Some(timestamp);
        self
    }

    pub fn with_provider(mut self, provider: Rc<dyn WalletProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_provider_key(mut self, key: impl Into<String>) -> Self {
        self.provider_key = Some(key.into());
        self
    }
}

impl From<LoginRequest> for LoginParams {
    fn from(request: LoginRequest) -> Self {
        Self {
            request,
            provider: None,
            provider_key: None,
        }
    }
}

struct Inner {
    config: EmbedConfig,
    env: EmbedEnvironment,
    state: Cell<EmbedState>,
    controller: Rc<SessionController>,
    emitter: Rc<EventEmitter>,
    frame_src: String,
    oauth_return: bool,
    size: RefCell<FrameSize>,
    frame: RefCell<Option<Rc<dyn Frame>>>,
    connection: RefCell<Option<Connection>>,
    watcher: RefCell<Option<ProviderWatcher>>,
}

/// Embedded guest application. Clones share the same embed.
#[derive(Clone)]
pub struct Embed {
    inner: Rc<Inner>,
}

impl Embed {
    /// Validate `config` and consume any saved OAuth route.
    pub fn new(config: EmbedConfig, env: EmbedEnvironment) -> Result<Self, BridgeError> {
        config.validate()?;

        let restored = take_saved_route(env.storage.as_ref());
        let frame_src = config.frame_src(restored.as_ref())?;
        let current_route = match &restored {
            Some(SavedRoute::Route(route)) => Some(route.clone()),
            _ => None,
        };
        if restored.is_some() {
            crate::log_info!("Returning from OAuth, reopening {}", frame_src);
        }

        let registry = Rc::new(ProviderRegistry::new(
            env.lookup.clone(),
            config.provider_keys.clone(),
        ));
        let emitter = Rc::new(EventEmitter::new());
        let redirector = OAuthRedirector::new(
            env.storage.clone(),
            env.navigator.clone(),
            config.oauth_tool_url.clone(),
            config.base_url.clone(),
            config.redirect_mode,
        );
        let controller = Rc::new(SessionController::new(
            registry,
            emitter.clone(),
            redirector,
            current_route,
        ));

        Ok(Self {
            inner: Rc::new(Inner {
                size: RefCell::new(config.size.clone()),
                config,
                env,
                state: Cell::new(EmbedState::Constructed),
                controller,
                emitter,
                frame_src,
                oauth_return: restored.is_some(),
                frame: RefCell::new(None),
                connection: RefCell::new(None),
                watcher: RefCell::new(None),
            }),
        })
    }

    /// Render the frame, handshake with the guest and start watching for
    /// wallet providers.
    ///
    /// Calling it again replaces the current frame and connection; an
    /// earlier call still waiting for its handshake then fails with
    /// `ConnectionDestroyed`.
    pub async fn init(&self) -> Result<(), BridgeError> {
        match self.state() {
            EmbedState::Destroyed => return Err(BridgeError::Destroyed),
            EmbedState::Constructed => {}
            _ => {
                crate::log_warn!("init called again, replacing the current frame");
                self.release();
                self.inner.state.set(EmbedState::Constructed);
                self.inner.controller.set_initialized(false);
            }
        }

        let config = &self.inner.config;
        let allowed_origin = config.allowed_origin()?;
        let size = self.inner.size.borrow().clone();
        let rendered = self.inner.env.frame_host.render(FrameRequest {
            container: &config.container,
            src: &self.inner.frame_src,
            size: &size,
            allowed_origin: &allowed_origin,
        })?;
        *self.inner.frame.borrow_mut() = Some(rendered.frame);
        self.inner.state.set(EmbedState::IframeRendered);

        let connection = Connection::connect(rendered.messenger, self.inner.controller.clone());
        *self.inner.connection.borrow_mut() = Some(connection.clone());
        self.inner.state.set(EmbedState::Handshaking);

        if let Err(e) = connection.ready().await {
            // A later init or destroy already released this connection.
            if self.owns(&connection) {
                self.release();
                self.inner.state.set(EmbedState::Constructed);
            }
            return Err(e);
        }
        if !self.owns(&connection) {
            return Err(match self.state() {
                EmbedState::Destroyed => BridgeError::Destroyed,
                _ => BridgeError::ConnectionDestroyed,
            });
        }

        self.inner.state.set(EmbedState::Ready);
        self.inner.controller.set_initialized(true);
        *self.inner.watcher.borrow_mut() = Some(ProviderWatcher::spawn(
            self.inner.controller.registry().clone(),
            connection.downgrade(),
            config.watch_settings(),
        ));
        crate::log_info!("Embed ready at {}", self.inner.frame_src);
        Ok(())
    }

    fn owns(&self, connection: &Connection) -> bool {
        self.inner
            .connection
            .borrow()
            .as_ref()
            .is_some_and(|current| current.same_as(connection))
    }

    /// Proxy for a guest-delegating operation, or "not initialized".
    fn guest(&self) -> Result<GuestProxy, BridgeError> {
        match self.inner.state.get() {
            EmbedState::Ready => {}
            EmbedState::Destroyed => return Err(BridgeError::Destroyed),
            _ => return Err(BridgeError::NotInitialized),
        }
        let connection = self
            .inner
            .connection
            .borrow()
            .clone()
            .ok_or(BridgeError::NotInitialized)?;
        if !connection.is_ready() {
            return Err(BridgeError::NotInitialized);
        }
        Ok(GuestProxy::new(connection))
    }

    fn login_wallet(&self, params: &LoginParams) -> Result<Option<Rc<dyn WalletProvider>>, BridgeError> {
        if let Some(provider) = &params.provider {
            return Ok(Some(provider.clone()));
        }
        match &params.provider_key {
            Some(key) => self
                .inner
                .controller
                .registry()
                .resolve(key)
                .map(Some)
                .ok_or_else(|| BridgeError::ProviderNotFound(key.clone())),
            None => Ok(None),
        }
    }

    /// Forward a login to the guest.
    ///
    /// Wallet logins need a provider and make it (with the account as
    /// address) the signer for later sign-verify requests. The session is
    /// restored if the guest rejects the login.
    pub async fn login(&self, params: LoginParams) -> Result<(), BridgeError> {
        let guest = self.guest()?;
        let kind = params.request.kind;

        let (wallet, address) = if kind.requires_provider() {
            let wallet = self.login_wallet(&params)?.ok_or(BridgeError::MissingProvider)?;
            (Some(wallet), Some(params.request.account.clone()))
        } else {
            (None, None)
        };

        let previous = self.inner.controller.set_wallet(wallet, address);
        let result = guest.login(params.request).await;
        if let Err(e) = &result {
            crate::log_warn!("{} login rejected: {}", kind, e);
            self.inner.controller.set_wallet(previous.0, previous.1);
        }
        result
    }

    pub async fn logout(&self, options: LogoutOptions) -> Result<(), BridgeError> {
        self.guest()?.logout(options).await?;
        self.inner.controller.set_wallet(None, None);
        Ok(())
    }

    /// Ask the guest; nothing is cached here.
    pub async fn is_authorized(&self, kind: AuthType, account: &str) -> Result<bool, BridgeError> {
        self.guest()?.is_authorized(kind, account).await
    }

    /// Navigate the guest. [`Embed::current_route`] follows once the guest
    /// reports the change.
    pub async fn set_route(&self, path: &str) -> Result<(), BridgeError> {
        self.guest()?.set_route(path).await
    }

    /// Resize the frame; omitted dimensions are kept.
    pub fn update_size(&self, width: Option<Dimension>, height: Option<Dimension>) {
        if let Some(frame) = self.inner.frame.borrow().as_ref() {
            apply_size(&**frame, width.as_ref(), height.as_ref());
        }
        self.inner.size.borrow_mut().update(width, height);
    }

    /// Tear everything down. Safe in any state, and more than once.
    pub fn destroy(&self) {
        if self.inner.state.get() == EmbedState::Destroyed {
            return;
        }
        self.inner.state.set(EmbedState::Destroyed);
        self.release();
        self.inner.controller.reset();
        self.inner.emitter.clear();
        crate::log_info!("Embed destroyed");
    }

    /// Stop the watcher, close the connection and detach the frame.
    fn release(&self) {
        if let Some(watcher) = self.inner.watcher.borrow_mut().take() {
            watcher.stop();
        }
        let connection = self.inner.connection.borrow_mut().take();
        if let Some(connection) = connection {
            connection.destroy();
        }
        self.inner.controller.hub().clear();
        let frame = self.inner.frame.borrow_mut().take();
        if let Some(frame) = frame {
            frame.detach();
        }
    }

    pub fn on(&self, listener: impl Fn(&EmbedEvent) + 'static) -> ListenerToken {
        self.inner.emitter.on(listener)
    }

    pub fn off(&self, token: ListenerToken) {
        self.inner.emitter.off(token);
    }

    /// Lifecycle state. A ready embed whose guest is reloading reports
    /// `Handshaking` until the guest handshakes again.
    pub fn state(&self) -> EmbedState {
        let state = self.inner.state.get();
        if state == EmbedState::Ready {
            let reconnecting = self
                .inner
                .connection
                .borrow()
                .as_ref()
                .is_some_and(|c| !c.is_ready());
            if reconnecting {
                return EmbedState::Handshaking;
            }
        }
        state
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.inner.config
    }

    pub fn frame_src(&self) -> &str {
        &self.inner.frame_src
    }

    pub fn size(&self) -> FrameSize {
        self.inner.size.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.inner.controller.session()
    }

    pub fn current_route(&self) -> Option<String> {
        self.inner.controller.current_route()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.inner.controller.connected_address()
    }

    /// Whether this page load consumed a saved OAuth route.
    pub fn is_oauth_return(&self) -> bool {
        self.inner.oauth_return
    }

    /// Provider keys detected so far.
    pub fn provider_keys(&self) -> Vec<String> {
        self.inner.controller.registry().keys()
    }
}
