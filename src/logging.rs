//! Bridge logging.
//!
//! The `log_*!` macros format once and hand the line to [`emit`], which
//! writes to the browser console on wasm32 and to `tracing` (target
//! `framebridge`) everywhere else.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[cfg(target_arch = "wasm32")]
pub fn emit(level: Level, msg: &str) {
    use web_sys::console;

    let line = wasm_bindgen::JsValue::from(format!("[framebridge] {msg}"));
    match level {
        Level::Debug => console::debug_1(&line),
        Level::Info => console::log_1(&line),
        Level::Warn => console::warn_1(&line),
        Level::Error => console::error_1(&line),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn emit(level: Level, msg: &str) {
    match level {
        Level::Debug => tracing::debug!(target: "framebridge", "{}", msg),
        Level::Info => tracing::info!(target: "framebridge", "{}", msg),
        Level::Warn => tracing::warn!(target: "framebridge", "{}", msg),
        Level::Error => tracing::error!(target: "framebridge", "{}", msg),
    }
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Debug, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Warn, &format!($($arg)*))
    };
}

/// Failures the integrator should see even with debug output off.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Error, &format!($($arg)*))
    };
}
