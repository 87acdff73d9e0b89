//! Forced application reload, the single recovery primitive.

use chainsession_shared::ReloadReason;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

/// Discards all in-memory derived state and restarts initialization.
pub trait Reloader {
    fn reload(&self, reason: ReloadReason);
}

/// Reloads the current page (wasm32).
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PageReload;

#[cfg(target_arch = "wasm32")]
impl Reloader for PageReload {
    fn reload(&self, reason: ReloadReason) {
        crate::log_info!("reloading page: {}", reason);
        let Some(window) = web_sys::window() else {
            crate::log_error!("no window to reload");
            return;
        };
        if let Err(e) = window.location().reload() {
            crate::log_error!("page reload failed: {:?}", e);
        }
    }
}

/// Hands reload requests to the host through a channel. The host owns the
/// receiver and rebuilds the session from scratch when a reason arrives.
#[derive(Debug, Clone)]
pub struct ChannelReload {
    sender: UnboundedSender<ReloadReason>,
}

impl ChannelReload {
    pub fn new() -> (Self, UnboundedReceiver<ReloadReason>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Reloader for ChannelReload {
    fn reload(&self, reason: ReloadReason) {
        crate::log_info!("requesting reload: {}", reason);
        if self.sender.unbounded_send(reason).is_err() {
            crate::log_warn!("reload requested but nobody is listening");
        }
    }
}
