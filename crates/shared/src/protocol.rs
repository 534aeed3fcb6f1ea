//! Bridge wire protocol: envelope, handshake and the two method tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::models::{AuthType, LoginRequest, LogoutOptions};

/// Namespace stamped on every bridge message.
///
/// Other scripts on the page use postMessage too; anything without this
/// namespace is not ours.
pub const PROTOCOL_NAMESPACE: &str = "framebridge";

/// Protocol revision exchanged during the handshake.
pub const PROTOCOL_VERSION: u32 = 2;

/// Outer wrapper of every message posted across the frame boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeEnvelope<T> {
    pub namespace: String,
    pub message: T,
}

impl<T> BridgeEnvelope<T> {
    pub fn new(message: T) -> Self {
        Self {
            namespace: PROTOCOL_NAMESPACE.to_string(),
            message,
        }
    }

    pub fn is_ours(&self) -> bool {
        self.namespace == PROTOCOL_NAMESPACE
    }
}

/// Messages exchanged by the two realms.
///
/// `C` is the method table of the receiving side: the host posts
/// `BridgeMessage<GuestCall>` and receives `BridgeMessage<HostCall>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeMessage<C> {
    /// Opening half of the handshake. Either side may send it first.
    Syn { version: u32 },
    /// Answer to a `Syn`.
    Ack { version: u32 },
    Call { id: String, call: C },
    Reply { id: String, outcome: ReplyOutcome },
    /// The sender is going away; outstanding calls will never be answered.
    Destroy,
}

/// Settled result of a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReplyOutcome {
    Fulfilled { value: Value },
    Rejected { error: RemoteError },
}

/// Methods the guest exposes to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "method",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GuestCall {
    Login(LoginRequest),
    Logout(LogoutOptions),
    IsAuthorized {
        kind: AuthType,
        account: String,
    },
    SetRoute {
        path: String,
    },
    /// Always carries the complete provider key set, never a delta.
    SetupWalletProviders {
        provider_keys: Vec<String>,
    },
    OnWalletEvent {
        provider_key: String,
        event_name: String,
        listener_id: String,
        args: Vec<Value>,
    },
}

impl GuestCall {
    pub fn method(&self) -> &'static str {
        match self {
            GuestCall::Login(_) => "login",
            GuestCall::Logout(_) => "logout",
            GuestCall::IsAuthorized { .. } => "isAuthorized",
            GuestCall::SetRoute { .. } => "setRoute",
            GuestCall::SetupWalletProviders { .. } => "setupWalletProviders",
            GuestCall::OnWalletEvent { .. } => "onWalletEvent",
        }
    }
}

/// Methods the host exposes to the guest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "method",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum HostCall {
    RequestLogin,
    RequestOauth {
        provider: String,
        state: String,
    },
    /// `message` is the hex-encoded payload to personal-sign.
    RequestSignVerify {
        message: String,
    },
    OnRouteChange {
        path: String,
    },
    OnTaskCompleted {
        data: Value,
    },
    RequestWalletProvider {
        provider_key: String,
        method: String,
        #[serde(default)]
        params: Value,
    },
    SubscribeWalletEvents {
        provider_key: String,
        event_name: String,
        listener_id: String,
    },
    UnsubscribeWalletEvents {
        provider_key: String,
        event_name: String,
        listener_id: String,
    },
}

impl HostCall {
    pub fn method(&self) -> &'static str {
        match self {
            HostCall::RequestLogin => "requestLogin",
            HostCall::RequestOauth { .. } => "requestOauth",
            HostCall::RequestSignVerify { .. } => "requestSignVerify",
            HostCall::OnRouteChange { .. } => "onRouteChange",
            HostCall::OnTaskCompleted { .. } => "onTaskCompleted",
            HostCall::RequestWalletProvider { .. } => "requestWalletProvider",
            HostCall::SubscribeWalletEvents { .. } => "subscribeWalletEvents",
            HostCall::UnsubscribeWalletEvents { .. } => "unsubscribeWalletEvents",
        }
    }
}

/// Messages posted by the host.
pub type HostEnvelope = BridgeEnvelope<BridgeMessage<GuestCall>>;

/// Messages posted by the guest.
pub type GuestEnvelope = BridgeEnvelope<BridgeMessage<HostCall>>;
