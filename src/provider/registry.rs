//! Registry of wallet providers detected in the host realm.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{resolve_path, ProviderLookup, WalletProvider};

/// Well-known globals wallets inject into the page.
pub const DEFAULT_PROVIDER_KEYS: &[&str] = &[
    "ethereum",
    "okxwallet",
    "bitkeep.ethereum",
    "phantom.ethereum",
    "coinbaseWalletExtension",
    "trustwallet",
    "tokenpocket.ethereum",
    "braveEthereum",
];

/// Known providers, keyed by provider key.
///
/// Entries are only ever added: a provider that disappears from the page
/// stays registered.
pub struct ProviderRegistry {
    lookup: Rc<dyn ProviderLookup>,
    candidates: Vec<String>,
    known: RefCell<BTreeMap<String, Rc<dyn WalletProvider>>>,
}

impl ProviderRegistry {
    pub fn new(lookup: Rc<dyn ProviderLookup>, candidates: Vec<String>) -> Self {
        Self {
            lookup,
            candidates,
            known: RefCell::new(BTreeMap::new()),
        }
    }

    /// Registry over [`DEFAULT_PROVIDER_KEYS`].
    pub fn with_default_keys(lookup: Rc<dyn ProviderLookup>) -> Self {
        let candidates = DEFAULT_PROVIDER_KEYS.iter().map(|k| k.to_string()).collect();
        Self::new(lookup, candidates)
    }

    /// Scan the candidate keys, returning those currently present.
    pub fn detect(&self) -> BTreeMap<String, Rc<dyn WalletProvider>> {
        self.candidates
            .iter()
            .filter_map(|key| {
                resolve_path(self.lookup.as_ref(), key).map(|provider| (key.clone(), provider))
            })
            .collect()
    }

    /// Detect again and register keys not seen before.
    ///
    /// Returns the newly registered keys.
    pub fn refresh(&self) -> Vec<String> {
        let detected = self.detect();
        let mut known = self.known.borrow_mut();
        let mut added = Vec::new();
        for (key, provider) in detected {
            if !known.contains_key(&key) {
                crate::log_info!("Wallet provider detected: {}", key);
                known.insert(key.clone(), provider);
                added.push(key);
            }
        }
        added
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.known.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.known.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.borrow().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Rc<dyn WalletProvider>> {
        self.known.borrow().get(key).cloned()
    }

    /// Resolve `key` against the live page, traversing dotted keys.
    pub fn resolve(&self, key: &str) -> Option<Rc<dyn WalletProvider>> {
        resolve_path(self.lookup.as_ref(), key)
    }
}
