//! Window-to-window message channel restricted to a single origin.
//!
//! The bridge only ever sees serialized envelopes that already passed the
//! origin check; messages from any other origin are dropped here.

mod memory;
#[cfg(target_arch = "wasm32")]
mod window;

pub use memory::MemoryMessenger;
#[cfg(target_arch = "wasm32")]
pub use window::PostMessageMessenger;

use framebridge_shared::BridgeError;
use url::Url;

/// Callback invoked with every accepted inbound message.
pub type MessageReceiver = Box<dyn Fn(String)>;

/// Duplex channel to the other realm.
pub trait Messenger {
    /// Post a serialized message to the other realm.
    fn send(&self, message: &str) -> Result<(), BridgeError>;

    /// Install the callback for inbound messages, replacing any previous one.
    fn set_receiver(&self, receiver: MessageReceiver);

    /// Stop delivering and sending messages. Safe to call repeatedly.
    fn close(&self);
}

/// Origin (`scheme://host[:port]`) that messages must come from.
pub fn allowed_origin(base_url: &str) -> Result<String, BridgeError> {
    let url = Url::parse(base_url).map_err(|e| BridgeError::InvalidUrl(format!("{base_url}: {e}")))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(BridgeError::InvalidUrl(format!(
            "{base_url}: no usable origin"
        )));
    }
    Ok(origin.ascii_serialization())
}

/// Whether a message from `origin` may be delivered.
pub fn origin_matches(allowed: &str, origin: &str) -> bool {
    allowed == origin.trim_end_matches('/')
}
