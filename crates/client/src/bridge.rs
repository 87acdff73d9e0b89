//! Event bridge between a live connection handle and the session manager.
//!
//! The bridge registers one listener per [`ProviderEventKind`] on the handle.
//! Listeners never touch session state: each firing is tagged with the
//! generation of the handle it was attached to and pushed into the manager's
//! channel. The manager consumes the messages one at a time and drops any
//! whose generation is no longer live.

use std::rc::Rc;

use chainsession_shared::{ProviderEvent, ProviderEventKind, ReloadReason};
use futures_channel::mpsc::UnboundedSender;

use crate::provider::{ConnectionHandle, EventListener, ListenerId};

/// One listener firing, as delivered to the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    pub generation: u64,
    pub event: ProviderEvent,
}

/// What the session manager does with a provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    Ignore,
    Reload(ReloadReason),
    ClearCacheAndReload(ReloadReason),
}

/// Reaction to an out-of-band provider event.
///
/// Every genuine change ends the current session with a full reload. The
/// first chain notification after subscription carries no previous chain and
/// is ignored.
pub fn policy(event: &ProviderEvent) -> BridgeAction {
    match event {
        ProviderEvent::ChainChanged { old: None, .. } => BridgeAction::Ignore,
        ProviderEvent::ChainChanged {
            new,
            old: Some(old),
        } => BridgeAction::Reload(ReloadReason::ChainChanged {
            from: *old,
            to: *new,
        }),
        ProviderEvent::AccountsChanged { .. } => BridgeAction::Reload(ReloadReason::AccountsChanged),
        ProviderEvent::Disconnect { .. } => {
            BridgeAction::ClearCacheAndReload(ReloadReason::BackendDisconnected)
        }
    }
}

/// The listeners registered on one handle.
#[derive(Debug)]
pub struct EventBridge {
    generation: u64,
    listeners: Vec<(ProviderEventKind, ListenerId)>,
}

impl EventBridge {
    /// Register a forwarding listener for every event kind on `handle`.
    pub fn attach(
        handle: &dyn ConnectionHandle,
        generation: u64,
        sink: UnboundedSender<BridgeMessage>,
    ) -> Self {
        let listeners = ProviderEventKind::ALL
            .iter()
            .map(|&kind| {
                let sink = sink.clone();
                let listener: EventListener = Rc::new(move |event: ProviderEvent| {
                    if sink
                        .unbounded_send(BridgeMessage { generation, event })
                        .is_err()
                    {
                        crate::log_debug!("dropping {} event: session manager is gone", kind);
                    }
                });
                (kind, handle.on(kind, listener))
            })
            .collect();

        Self {
            generation,
            listeners,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Remove every listener this bridge registered.
    pub fn detach(self, handle: &dyn ConnectionHandle) {
        for (kind, id) in self.listeners {
            handle.off(kind, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chainsession_shared::{ChainId, SessionError};
    use futures_channel::mpsc::unbounded;
    use futures_util::StreamExt;

    use super::*;
    use crate::provider::WalletBackend;
    use crate::testing::{address, ScriptedBackend};

    #[test]
    fn initial_chain_notification_is_ignored() {
        let event = ProviderEvent::ChainChanged {
            new: ChainId(1),
            old: None,
        };
        assert_eq!(policy(&event), BridgeAction::Ignore);
    }

    #[test]
    fn genuine_changes_reload() {
        let chain = ProviderEvent::ChainChanged {
            new: ChainId(137),
            old: Some(ChainId(1)),
        };
        assert_eq!(
            policy(&chain),
            BridgeAction::Reload(ReloadReason::ChainChanged {
                from: ChainId(1),
                to: ChainId(137),
            })
        );

        let accounts = ProviderEvent::AccountsChanged { accounts: vec![] };
        assert_eq!(
            policy(&accounts),
            BridgeAction::Reload(ReloadReason::AccountsChanged)
        );

        let disconnect = ProviderEvent::Disconnect {
            code: Some(4900),
            message: None,
        };
        assert_eq!(
            policy(&disconnect),
            BridgeAction::ClearCacheAndReload(ReloadReason::BackendDisconnected)
        );
    }

    #[tokio::test]
    async fn attach_forwards_tagged_events_and_detach_removes_listeners() -> Result<(), SessionError> {
        let backend = ScriptedBackend::new("injected", address(1), ChainId(1));
        let handle = backend.connect().await?;
        let probe = backend.last_handle().expect("handle was opened");
        let (tx, mut rx) = unbounded();

        let bridge = EventBridge::attach(handle.as_ref(), 7, tx);
        assert_eq!(probe.listener_count(), 3);
        assert_eq!(bridge.generation(), 7);

        let event = ProviderEvent::AccountsChanged {
            accounts: vec![address(2)],
        };
        probe.emit(event.clone());
        assert_eq!(
            rx.next().await,
            Some(BridgeMessage {
                generation: 7,
                event,
            })
        );

        bridge.detach(handle.as_ref());
        assert_eq!(probe.listener_count(), 0);
        probe.emit(ProviderEvent::Disconnect {
            code: None,
            message: None,
        });
        // Detaching dropped every sender, so the channel is closed and empty.
        assert_eq!(rx.try_next().ok(), Some(None));
        Ok(())
    }
}
