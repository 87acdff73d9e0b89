//! Wallet session context for Dioxus components.
//!
//! Wrap the app in [`WalletProvider`] and read the session with
//! [`use_wallet`]:
//!
//! ```rust,ignore
//! let manager = SharedSessionManager::new(SessionManager::for_browser(SessionConfig::default()));
//! rsx! {
//!     WalletProvider { manager,
//!         // Your app here
//!     }
//! }
//!
//! fn ConnectButton() -> Element {
//!     let wallet = use_wallet();
//!     rsx! {
//!         if wallet.is_connected() {
//!             button { onclick: move |_| { wallet.disconnect(); }, "{wallet.address()}" }
//!         } else {
//!             button { disabled: wallet.is_pending(), onclick: move |_| { wallet.connect(); }, "Connect" }
//!         }
//!     }
//! }
//! ```

use std::future::Future;
use std::rc::Rc;

use chainsession_shared::{Address, ChainId, SessionError, SessionState};
use dioxus::core::Task;
use dioxus::prelude::*;

use crate::manager::SessionManager;

/// Session manager handed to [`WalletProvider`] as a prop.
#[derive(Clone)]
pub struct SharedSessionManager(pub Rc<SessionManager>);

impl SharedSessionManager {
    pub fn new(manager: SessionManager) -> Self {
        Self(Rc::new(manager))
    }
}

impl PartialEq for SharedSessionManager {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Wallet context provided to the app
#[derive(Clone)]
pub struct WalletContext {
    pub session: Signal<SessionState>,
    pub pending: Signal<bool>,
    manager: SharedSessionManager,
}

/// Provider component that sets up the wallet context, restores a cached
/// wallet once and keeps listening for provider events.
#[component]
pub fn WalletProvider(manager: SharedSessionManager, children: Element) -> Element {
    let session = use_signal(|| manager.0.snapshot());
    let pending = use_signal(|| manager.0.is_pending());

    use_hook({
        let manager = manager.0.clone();
        move || {
            manager.watch(move |state| {
                let mut session = session;
                session.set(state);
            });

            let events = manager.clone();
            spawn(async move {
                events.run_events().await;
            });

            let mut pending = pending;
            spawn(async move {
                let restore = async { manager.auto_restore().await.map(|_| ()) };
                track(&manager, "auto restore", restore, move |busy| pending.set(busy)).await;
            });
        }
    });

    use_context_provider(|| WalletContext {
        session,
        pending,
        manager: manager.clone(),
    });

    children
}

/// The wallet context installed by the nearest [`WalletProvider`].
pub fn use_wallet() -> WalletContext {
    use_context::<WalletContext>()
}

impl WalletContext {
    pub fn snapshot(&self) -> SessionState {
        *self.session.read()
    }

    pub fn address(&self) -> Address {
        self.session.read().address
    }

    pub fn chain_id(&self) -> ChainId {
        self.session.read().chain_id
    }

    pub fn is_connected(&self) -> bool {
        self.session.read().connected
    }

    /// True while a connect, disconnect or restore is in flight.
    pub fn is_pending(&self) -> bool {
        *self.pending.read()
    }

    pub fn manager(&self) -> Rc<SessionManager> {
        self.manager.0.clone()
    }

    /// Open the wallet selection flow in the background.
    pub fn connect(&self) -> Task {
        let manager = self.manager.0.clone();
        let mut pending = self.pending;
        spawn(async move {
            let connect = async { manager.connect().await.map(|_| ()) };
            track(&manager, "connect", connect, move |busy| pending.set(busy)).await;
        })
    }

    /// Disconnect the live wallet in the background.
    pub fn disconnect(&self) -> Task {
        let manager = self.manager.0.clone();
        let mut pending = self.pending;
        spawn(async move {
            track(&manager, "disconnect", manager.disconnect(), move |busy| pending.set(busy)).await;
        })
    }
}

/// Run one manager operation, raising the pending flag while it runs.
///
/// Once it settles the flag follows the manager's own phase, so a rejected
/// call never hides another operation that is still in flight.
async fn track(
    manager: &SessionManager,
    operation: &str,
    run: impl Future<Output = Result<(), SessionError>>,
    mut set_pending: impl FnMut(bool),
) {
    set_pending(true);
    settle(operation, run.await);
    set_pending(manager.is_pending());
}

/// Recoverable failures stop here; broken invariants do not.
fn settle(operation: &str, result: Result<(), SessionError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_fatal() => panic!("{operation}: {err}"),
        Err(err) => crate::log_warn!("{} failed: {}", operation, err),
    }
}

#[cfg(test)]
mod tests {
    use futures_channel::oneshot;

    use super::*;
    use crate::config::SessionConfig;
    use crate::provider::{BackendCache, ModalProviderSource};
    use crate::reload::ChannelReload;
    use crate::storage::MemoryStorage;
    use crate::testing::{address, ScriptedBackend, ScriptedSelector};

    fn manager_with(selector: ScriptedSelector) -> SessionManager {
        let backend = ScriptedBackend::new("injected", address(1), ChainId(1));
        let cache = BackendCache::new(Rc::new(MemoryStorage::new()), "cached");
        let source = ModalProviderSource::new(selector, cache).with_backend(backend);
        let (reloader, _reloads) = ChannelReload::new();
        SessionManager::new(SessionConfig::default(), source, reloader)
    }

    #[tokio::test]
    async fn pending_clears_once_the_operation_settles() {
        let manager = manager_with(ScriptedSelector::first());
        let mut seen = Vec::new();

        let connect = async { manager.connect().await.map(|_| ()) };
        track(&manager, "connect", connect, |busy| seen.push(busy)).await;
        track(&manager, "disconnect", manager.disconnect(), |busy| seen.push(busy)).await;

        assert_eq!(seen, [true, false, true, false]);
        assert!(!manager.is_pending());
    }

    #[tokio::test]
    async fn rejected_call_keeps_pending_while_another_is_in_flight() {
        let (gate_tx, gate_rx) = oneshot::channel();
        let manager = manager_with(ScriptedSelector::first().gated(gate_rx));
        let mut seen = Vec::new();

        let (first, (), ()) = tokio::join!(
            manager.connect(),
            async {
                let second = async { manager.connect().await.map(|_| ()) };
                track(&manager, "connect", second, |busy| seen.push(busy)).await;
            },
            async {
                let _ = gate_tx.send(());
            }
        );

        assert!(first.is_ok());
        assert_eq!(seen, [true, true]);
        assert!(!manager.is_pending());
    }

    #[tokio::test]
    async fn recoverable_failures_are_swallowed() {
        let manager = manager_with(ScriptedSelector::cancelling());
        let mut seen = Vec::new();

        let connect = async { manager.connect().await.map(|_| ()) };
        track(&manager, "connect", connect, |busy| seen.push(busy)).await;

        assert_eq!(seen, [true, false]);
        assert_eq!(manager.snapshot(), SessionState::default());
    }

    #[test]
    #[should_panic(expected = "session invariant violated")]
    fn fatal_errors_are_not_swallowed() {
        settle(
            "connect",
            Err(SessionError::InvariantViolation("handle replaced while live".into())),
        );
    }
}
