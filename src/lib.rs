//! Host side of an iframe embedding bridge.
//!
//! An [`Embed`] mounts a cross-origin guest application in a frame, runs an
//! RPC bridge with it over `postMessage`, and lends the guest the host's
//! wallet providers, OAuth navigation and login signatures.

pub mod config;
pub mod embed;
pub mod emitter;
pub mod events;
pub mod frame;
pub mod logging;
pub mod oauth;
pub mod platform;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod signer;
pub mod storage;
pub mod transport;

pub use config::EmbedConfig;
pub use embed::{Embed, EmbedEnvironment, EmbedState, LoginParams};
pub use emitter::{EmbedEvent, EventEmitter, ListenerToken};
pub use frame::{Dimension, FrameSize};
pub use oauth::RedirectMode;
pub use signer::{Ed25519Signer, LoginSigner};

pub use framebridge_shared::{
    AuthType, BridgeError, ErrorKind, LoginRequest, LogoutOptions, OAuthProvider, RemoteError,
};
