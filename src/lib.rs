use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod aggregate;
pub mod api;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod pipeline;
pub mod platform;
pub mod producer;
pub mod series;
pub mod server;
pub mod status;
pub mod storage;
pub mod storyboard;
pub mod storyboarder;
pub mod video;
pub mod writer;
pub mod youtube;

pub use error::{StudioError, StudioResult};

pub type LogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<LogHook>>> = Lazy::new(|| Mutex::new(None));

/// Mirrors pipeline progress lines to `hook` (the launcher's log panel).
pub fn set_log_hook(hook: Option<LogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        _ => tracing::info!("[{}] {}", tag, message),
    }

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
