//! Shared error types, including the error envelope sent across the bridge.

use serde::{Deserialize, Serialize};

/// Error envelope carried in a rejected reply.
///
/// Guests and wallet providers throw arbitrary errors; we keep whatever code
/// they attached plus a human-readable message and relay it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    /// Machine-readable code, if the thrower supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Coarse classification used by callers to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misuse: fix the call site, never retry.
    Precondition,
    /// The other realm (guest or wallet provider) rejected the call.
    Remote,
    /// Channel, storage or encoding trouble.
    Transport,
    /// Input rejected before any side effect happened.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("embed not initialized")]
    NotInitialized,
    #[error("embed destroyed")]
    Destroyed,
    #[error("connection destroyed")]
    ConnectionDestroyed,
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("no wallet provider connected")]
    MissingProvider,
    #[error("no connected address")]
    MissingAddress,
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("invalid provider: {0}")]
    InvalidProvider(String),
    #[error("oauth tool url not configured")]
    MissingOAuthToolUrl,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("protocol version mismatch: host {host}, guest {guest}")]
    ProtocolMismatch { host: u32, guest: u32 },
    #[error("remote error: {0}")]
    Remote(RemoteError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("signing error: {0}")]
    Signing(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotInitialized
            | BridgeError::Destroyed
            | BridgeError::ContainerNotFound(_)
            | BridgeError::MissingProvider
            | BridgeError::MissingAddress
            | BridgeError::ProviderNotFound(_)
            | BridgeError::MissingOAuthToolUrl => ErrorKind::Precondition,
            BridgeError::Remote(_) => ErrorKind::Remote,
            BridgeError::InvalidProvider(_)
            | BridgeError::InvalidUrl(_)
            | BridgeError::InvalidConfig(_)
            | BridgeError::ProtocolMismatch { .. } => ErrorKind::Validation,
            BridgeError::ConnectionDestroyed
            | BridgeError::Transport(_)
            | BridgeError::Storage(_)
            | BridgeError::Serialization(_)
            | BridgeError::Signing(_) => ErrorKind::Transport,
        }
    }

    /// Stable code sent to the guest alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotInitialized => "not_initialized",
            BridgeError::Destroyed => "destroyed",
            BridgeError::ConnectionDestroyed => "connection_destroyed",
            BridgeError::ContainerNotFound(_) => "container_not_found",
            BridgeError::MissingProvider => "missing_provider",
            BridgeError::MissingAddress => "missing_address",
            BridgeError::ProviderNotFound(_) => "provider_not_found",
            BridgeError::InvalidProvider(_) => "invalid_provider",
            BridgeError::MissingOAuthToolUrl => "missing_oauth_tool_url",
            BridgeError::InvalidUrl(_) => "invalid_url",
            BridgeError::InvalidConfig(_) => "invalid_config",
            BridgeError::ProtocolMismatch { .. } => "protocol_mismatch",
            BridgeError::Remote(_) => "remote",
            BridgeError::Transport(_) => "transport",
            BridgeError::Storage(_) => "storage",
            BridgeError::Serialization(_) => "serialization",
            BridgeError::Signing(_) => "signing",
        }
    }

    /// Convert a host-side failure into the envelope replied to the guest.
    ///
    /// Errors that already came from a remote realm pass through untouched.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            BridgeError::Remote(inner) => inner.clone(),
            other => RemoteError::new(other.to_string()).with_code(other.code()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}
