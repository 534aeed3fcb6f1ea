//! Task spawning and timers for the single-threaded event loop.
//!
//! - Web: `wasm_bindgen_futures::spawn_local` and `gloo_timers`
//! - Native: `tokio::task::spawn_local` (must run inside a `LocalSet`) and
//!   `tokio::time::sleep`

use std::future::Future;
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    tokio::task::spawn_local(future);
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
