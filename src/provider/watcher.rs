//! Periodic re-scan for late-injected wallet providers.

use std::rc::Rc;
use std::time::Duration;

use framebridge_shared::BridgeError;
use futures_util::future::{AbortHandle, Abortable};

use super::ProviderRegistry;
use crate::platform;
use crate::rpc::{GuestProxy, WeakConnection};

/// Timing of the provider watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Wait before the first notification, so the guest can finish booting
    pub initial_delay: Duration,
    /// Period between re-scans
    pub interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            interval: Duration::from_millis(1000),
        }
    }
}

/// Handle to the running watcher task. Stopping (or dropping) it cancels
/// the task at its next suspension point.
pub struct ProviderWatcher {
    abort: AbortHandle,
}

impl ProviderWatcher {
    /// Spawn the watcher on the local task set.
    ///
    /// After `initial_delay` the guest receives the full provider key list;
    /// then every `interval` the registry is refreshed and, if new keys
    /// appeared, the full list is sent again. Ticks run one after another on
    /// a single task, so they never overlap.
    pub fn spawn(
        registry: Rc<ProviderRegistry>,
        connection: WeakConnection,
        settings: WatchSettings,
    ) -> Self {
        let (abort, registration) = AbortHandle::new_pair();

        let task = async move {
            platform::sleep(settings.initial_delay).await;
            registry.refresh();
            let mut stale = notify(&registry, &connection).await.is_err();

            loop {
                platform::sleep(settings.interval).await;
                if !registry.refresh().is_empty() || stale {
                    stale = notify(&registry, &connection).await.is_err();
                }
            }
        };

        platform::spawn_local(async move {
            if Abortable::new(task, registration).await.is_err() {
                crate::log_debug!("Provider watcher stopped");
            }
        });

        Self { abort }
    }

    pub fn stop(&self) {
        self.abort.abort();
    }
}

impl Drop for ProviderWatcher {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Send the complete key list to the guest. Failures are logged, never
/// propagated to the integrator.
pub(crate) async fn notify(
    registry: &ProviderRegistry,
    connection: &WeakConnection,
) -> Result<(), BridgeError> {
    let keys = registry.keys();
    let result = match connection.upgrade() {
        Some(connection) => {
            GuestProxy::new(connection)
                .setup_wallet_providers(keys.clone())
                .await
        }
        None => Err(BridgeError::ConnectionDestroyed),
    };
    match &result {
        Ok(()) => crate::log_debug!("Guest notified of providers: {:?}", keys),
        Err(e) => crate::log_warn!("Failed to notify guest of providers: {}", e),
    }
    result
}
