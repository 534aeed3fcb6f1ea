//! Wallet providers living in the host realm.
//!
//! Providers are normally injected into the page's global scope by browser
//! extensions (`window.ethereum`, `window.phantom.ethereum`, ...). The bridge
//! never touches globals directly; it goes through a [`ProviderLookup`], so
//! the registry works the same over the real window and over an in-memory
//! tree.

mod memory;
mod registry;
mod watcher;
#[cfg(target_arch = "wasm32")]
mod web;

pub use memory::{MemoryLookup, MemoryProvider};
pub use registry::{ProviderRegistry, DEFAULT_PROVIDER_KEYS};
pub use watcher::{ProviderWatcher, WatchSettings};
#[cfg(target_arch = "wasm32")]
pub use web::{JsProvider, WindowProviderLookup};

use std::rc::Rc;

use framebridge_shared::BridgeError;
use futures_util::future::LocalBoxFuture;
use serde_json::Value;

/// Handler attached to a provider event. Receives the event arguments in
/// the order the provider emitted them.
pub type EventListener = Rc<dyn Fn(Vec<Value>)>;

/// Pending result of a provider request.
pub type ProviderRequest = LocalBoxFuture<'static, Result<Value, BridgeError>>;

/// EIP-1193 style wallet capability.
pub trait WalletProvider {
    /// Generic `request({ method, params })`.
    fn request(&self, method: &str, params: Value) -> ProviderRequest;

    /// Whether the provider has an event-registration capability.
    fn supports_events(&self) -> bool {
        true
    }

    fn on(&self, event: &str, listener: EventListener) -> Result<(), BridgeError>;

    /// Detach a listener previously passed to [`WalletProvider::on`].
    /// Listeners are matched by identity.
    fn remove_listener(&self, event: &str, listener: &EventListener);

    /// Nested object one level down, for dotted provider keys.
    fn child(&self, _name: &str) -> Option<Rc<dyn WalletProvider>> {
        None
    }
}

/// Source of top-level provider objects.
pub trait ProviderLookup {
    fn root(&self, name: &str) -> Option<Rc<dyn WalletProvider>>;
}

/// Resolve a possibly dotted key (`outer.inner`) segment by segment.
///
/// Returns `None` if any segment is missing or empty.
pub fn resolve_path(lookup: &dyn ProviderLookup, key: &str) -> Option<Rc<dyn WalletProvider>> {
    let mut segments = key.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = lookup.root(first)?;
    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = current.child(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_keys_traverse_level_by_level() {
        let lookup = MemoryLookup::new();
        let outer = MemoryProvider::new();
        let inner = MemoryProvider::new();
        outer.add_child("inner", inner.clone());
        lookup.insert("outer", outer.clone());

        let resolved = resolve_path(&*lookup, "outer.inner").unwrap();
        let expected: Rc<dyn WalletProvider> = inner;
        assert!(Rc::ptr_eq(&resolved, &expected));
        assert!(resolve_path(&*lookup, "outer").is_some());
    }

    #[test]
    fn missing_segments_resolve_to_none() {
        let lookup = MemoryLookup::new();
        lookup.insert("outer", MemoryProvider::new());

        assert!(resolve_path(&*lookup, "outer.inner").is_none());
        assert!(resolve_path(&*lookup, "missing").is_none());
        assert!(resolve_path(&*lookup, "").is_none());
        assert!(resolve_path(&*lookup, "outer.").is_none());
        assert!(resolve_path(&*lookup, ".outer").is_none());
    }
}
