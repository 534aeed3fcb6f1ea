//! Typed proxy over the guest's method table.

use std::future::Future;

use framebridge_shared::{AuthType, BridgeError, GuestCall, LoginRequest, LogoutOptions};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Connection;

/// Remote-call proxy handed out once the handshake has completed.
///
/// Every method posts its call immediately and returns a future for the
/// reply, so calls reach the guest in the order they were made.
#[derive(Clone)]
pub struct GuestProxy {
    connection: Connection,
}

impl GuestProxy {
    pub(crate) fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn login(
        &self,
        request: LoginRequest,
    ) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let reply = self.connection.call(GuestCall::Login(request));
        async move { reply.await.map(|_| ()) }
    }

    pub fn logout(
        &self,
        options: LogoutOptions,
    ) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let reply = self.connection.call(GuestCall::Logout(options));
        async move { reply.await.map(|_| ()) }
    }

    pub fn is_authorized(
        &self,
        kind: AuthType,
        account: &str,
    ) -> impl Future<Output = Result<bool, BridgeError>> + 'static {
        let reply = self.connection.call(GuestCall::IsAuthorized {
            kind,
            account: account.to_string(),
        });
        async move { decode(reply.await?) }
    }

    pub fn set_route(&self, path: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let reply = self.connection.call(GuestCall::SetRoute {
            path: path.to_string(),
        });
        async move { reply.await.map(|_| ()) }
    }

    pub fn setup_wallet_providers(
        &self,
        provider_keys: Vec<String>,
    ) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let reply = self
            .connection
            .call(GuestCall::SetupWalletProviders { provider_keys });
        async move { reply.await.map(|_| ()) }
    }

    pub fn on_wallet_event(
        &self,
        provider_key: &str,
        event_name: &str,
        listener_id: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let reply = self.connection.call(GuestCall::OnWalletEvent {
            provider_key: provider_key.to_string(),
            event_name: event_name.to_string(),
            listener_id: listener_id.to_string(),
            args,
        });
        async move { reply.await.map(|_| ()) }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|e| BridgeError::Serialization(e.to_string()))
}
