//! Cross-platform storage module.
//!
//! Persists the small string records that must survive a full-page
//! navigation (the saved OAuth route):
//! - Web: `localStorage`
//! - Native: one file per key in the platform-appropriate config directory:
//!   - Linux: `~/.config/framebridge/`
//!   - macOS: `~/Library/Application Support/framebridge/`
//!   - Windows: `%APPDATA%\framebridge\`

use std::cell::RefCell;
use std::collections::HashMap;

use framebridge_shared::BridgeError;

/// String key/value store that outlives the current page.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError>;

    fn remove(&self, key: &str);

    /// Read a value and erase it.
    fn take(&self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        self.remove(key);
        Some(value)
    }
}

/// Platform persistent storage.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    #[cfg(not(target_arch = "wasm32"))]
    root: Option<std::path::PathBuf>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

// =========================================
// Web (WASM) implementation
// =========================================

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        local_storage()?.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        let storage = local_storage()
            .ok_or_else(|| BridgeError::Storage("localStorage unavailable".to_string()))?;
        storage
            .set_item(key, value)
            .map_err(|e| BridgeError::Storage(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = local_storage() {
            let _ = storage.remove_item(key);
        }
    }
}

// =========================================
// Native implementation
// =========================================

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorage {
    /// Store records under `root` instead of the user config directory.
    pub fn in_dir(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn dir(&self) -> Option<std::path::PathBuf> {
        let dir = match &self.root {
            Some(root) => root.clone(),
            None => dirs::config_dir()?.join("framebridge"),
        };

        // Ensure the directory exists
        if !dir.exists() {
            std::fs::create_dir_all(&dir).ok()?;
        }

        Some(dir)
    }

    fn file_path(&self, key: &str) -> Option<std::path::PathBuf> {
        let dir = self.dir()?;
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(dir.join(format!("{}.txt", safe_key)))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.file_path(key)?;
        std::fs::read_to_string(path).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        let path = self
            .file_path(key)
            .ok_or_else(|| BridgeError::Storage("no config directory".to_string()))?;
        std::fs::write(path, value).map_err(|e| BridgeError::Storage(e.to_string()))
    }

    fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Process-local store, for native hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}
