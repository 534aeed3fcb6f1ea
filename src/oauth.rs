//! OAuth redirects and the saved-route record.
//!
//! Before leaving the page for an OAuth flow the host writes where the guest
//! was (its route, or its full frame URL) to persistent storage. The next
//! page load consumes the record once and reopens the guest there.

use std::cell::RefCell;
use std::rc::Rc;

use framebridge_shared::{BridgeError, OAuthProvider};
use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

pub const SAVED_ROUTE_KEY: &str = "framebridge.savedRoute";
pub const SAVED_URL_KEY: &str = "framebridge.savedUrl";

/// What is remembered across an OAuth round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RedirectMode {
    /// The guest's last reported route
    #[default]
    Route,
    /// The full frame URL for that route
    FrameUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedRoute {
    Route(String),
    FrameUrl(String),
}

/// Persist `record`, replacing any record of the other kind.
pub fn save_route(storage: &dyn KeyValueStore, record: &SavedRoute) -> Result<(), BridgeError> {
    match record {
        SavedRoute::Route(route) => {
            storage.set(SAVED_ROUTE_KEY, route)?;
            storage.remove(SAVED_URL_KEY);
        }
        SavedRoute::FrameUrl(url) => {
            storage.set(SAVED_URL_KEY, url)?;
            storage.remove(SAVED_ROUTE_KEY);
        }
    }
    Ok(())
}

/// Read the record left by a previous page and erase it.
///
/// `Some` means this page load is an OAuth return.
pub fn take_saved_route(storage: &dyn KeyValueStore) -> Option<SavedRoute> {
    let route = storage.take(SAVED_ROUTE_KEY);
    let url = storage.take(SAVED_URL_KEY);
    route
        .map(SavedRoute::Route)
        .or_else(|| url.map(SavedRoute::FrameUrl))
}

/// Top-level page navigation.
pub trait Navigator {
    fn current_href(&self) -> String;

    fn navigate(&self, url: &str) -> Result<(), BridgeError>;
}

/// `window.location`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for WindowNavigator {
    fn current_href(&self) -> String {
        web_sys::window()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default()
    }

    fn navigate(&self, url: &str) -> Result<(), BridgeError> {
        let window =
            web_sys::window().ok_or_else(|| BridgeError::Transport("no window".to_string()))?;
        window
            .location()
            .set_href(url)
            .map_err(|e| BridgeError::Transport(format!("{:?}", e)))
    }
}

/// Records navigations instead of leaving the page.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    href: RefCell<String>,
    visited: RefCell<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(href: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            href: RefCell::new(href.into()),
            visited: RefCell::new(Vec::new()),
        })
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_href(&self) -> String {
        self.href.borrow().clone()
    }

    fn navigate(&self, url: &str) -> Result<(), BridgeError> {
        self.visited.borrow_mut().push(url.to_string());
        *self.href.borrow_mut() = url.to_string();
        Ok(())
    }
}

/// URL that starts `provider`'s flow on the OAuth tool.
pub fn oauth_url(tool_url: &str, provider: OAuthProvider, state: &str, from: &str) -> String {
    format!(
        "{}{}?state={}&from={}",
        tool_url.trim_end_matches('/'),
        provider.path(),
        urlencoding::encode(state),
        urlencoding::encode(from)
    )
}

/// Join a guest route onto the frame base URL.
pub fn route_url(base_url: &str, route: &str) -> String {
    let route = route.trim_start_matches('/');
    if route.is_empty() {
        return base_url.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), route)
}

/// Saves the guest's position and sends the page to the OAuth tool.
pub struct OAuthRedirector {
    storage: Rc<dyn KeyValueStore>,
    navigator: Rc<dyn Navigator>,
    tool_url: Option<String>,
    base_url: String,
    mode: RedirectMode,
}

impl OAuthRedirector {
    pub fn new(
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
        tool_url: Option<String>,
        base_url: impl Into<String>,
        mode: RedirectMode,
    ) -> Self {
        Self {
            storage,
            navigator,
            tool_url,
            base_url: base_url.into(),
            mode,
        }
    }

    /// Start the OAuth flow for `provider`. Returns the URL navigated to.
    ///
    /// An unknown provider or a missing tool URL fails before anything is
    /// written or navigated.
    pub fn redirect(
        &self,
        provider: &str,
        state: &str,
        current_route: Option<&str>,
    ) -> Result<String, BridgeError> {
        let provider: OAuthProvider = provider.parse()?;
        let tool_url = self
            .tool_url
            .as_deref()
            .ok_or(BridgeError::MissingOAuthToolUrl)?;

        let target = oauth_url(tool_url, provider, state, &self.navigator.current_href());
        let route = current_route.unwrap_or("/");
        let record = match self.mode {
            RedirectMode::Route => SavedRoute::Route(route.to_string()),
            RedirectMode::FrameUrl => SavedRoute::FrameUrl(route_url(&self.base_url, route)),
        };

        save_route(self.storage.as_ref(), &record)?;
        crate::log_info!("Redirecting to {} OAuth", provider.name());
        self.navigator.navigate(&target)?;
        Ok(target)
    }
}
