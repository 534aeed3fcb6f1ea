//! RPC connection between the host page and the guest frame.
//!
//! ```text
//!  host                                   guest
//!  ────                                   ─────
//!  Connection::connect ── syn ──────────▶
//!                      ◀───────── ack ──  (or the guest's own syn, answered with ack)
//!  state: Ready
//!  GuestProxy::login ──── call{id} ─────▶
//!                      ◀──── reply{id} ──
//!                      ◀──── call{id} ───  HostCall::OnRouteChange
//!  HostMethods::handle ── reply{id} ────▶
//! ```

mod connection;
mod remote;

pub use connection::{Connection, ConnectionState, WeakConnection};
pub use remote::GuestProxy;

use framebridge_shared::{BridgeError, HostCall};
use futures_util::future::LocalBoxFuture;
use serde_json::Value;

/// Reply to a guest-initiated call.
pub type HostReply = LocalBoxFuture<'static, Result<Value, BridgeError>>;

/// Method table the host exposes to the guest.
pub trait HostMethods {
    /// Handle one guest call.
    ///
    /// Runs synchronously up to the first suspension point when the call is
    /// delivered, so state changes happen in transport order. The returned
    /// future is driven to completion on its own task.
    fn handle(&self, call: HostCall, connection: &Connection) -> HostReply;
}
