//! Session manager: orchestrates the provider source, the state store and the
//! event bridge.
//!
//! All methods take `&self` and the manager is meant to be shared through an
//! `Rc` on a single-threaded executor. No `RefCell` borrow is held across an
//! `.await`, so overlapping calls from the same event loop observe a
//! consistent phase and are rejected instead of interleaving.
//!
//! ```text
//!            connect / auto_restore
//!   Idle ───────────────────────────▶ Connecting ──ok──▶ Connected
//!    ▲                                    │                │   │
//!    └───────────── failure ──────────────┘                │   │ provider event
//!    ▲                                                     │   ▼
//!    └────────── Disconnecting ◀──── disconnect ───────────┘ Terminated
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chainsession_shared::{
    describe_chain, BackendDescriptor, ReloadReason, SessionError, SessionState,
};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;

use crate::bridge::{policy, BridgeAction, BridgeMessage, EventBridge};
use crate::config::SessionConfig;
use crate::provider::{ConnectionHandle, ProviderSource};
use crate::reload::Reloader;
use crate::store::{SessionAction, SessionStore};

/// Lifecycle phase of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No handle, store at its default.
    Idle,
    /// A selection or silent restore is in flight.
    Connecting,
    /// Handle live, store populated, bridge attached.
    Connected,
    /// An explicit disconnect is tearing the handle down.
    Disconnecting,
    /// Ended by a provider event; only a fresh start can connect again.
    Terminated,
}

impl SessionPhase {
    pub fn name(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Connected => "connected",
            SessionPhase::Disconnecting => "disconnecting",
            SessionPhase::Terminated => "terminated",
        }
    }

    /// Whether an operation is in flight.
    pub fn is_pending(self) -> bool {
        matches!(self, SessionPhase::Connecting | SessionPhase::Disconnecting)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Observer = Rc<dyn Fn(SessionState)>;

struct ActiveSession {
    handle: Box<dyn ConnectionHandle>,
    bridge: EventBridge,
}

pub struct SessionManager {
    config: SessionConfig,
    source: Box<dyn ProviderSource>,
    reloader: Box<dyn Reloader>,
    store: RefCell<SessionStore>,
    phase: Cell<SessionPhase>,
    active: RefCell<Option<ActiveSession>>,
    generation: Cell<u64>,
    restore_attempted: Cell<bool>,
    events_tx: UnboundedSender<BridgeMessage>,
    events_rx: RefCell<Option<UnboundedReceiver<BridgeMessage>>>,
    observers: RefCell<Vec<Observer>>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        source: impl ProviderSource + 'static,
        reloader: impl Reloader + 'static,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            store: RefCell::new(SessionStore::new(config.default_chain_id())),
            config,
            source: Box::new(source),
            reloader: Box::new(reloader),
            phase: Cell::new(SessionPhase::Idle),
            active: RefCell::new(None),
            generation: Cell::new(0),
            restore_attempted: Cell::new(false),
            events_tx,
            events_rx: RefCell::new(Some(events_rx)),
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn ProviderSource {
        self.source.as_ref()
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.store.borrow().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn is_pending(&self) -> bool {
        self.phase.get().is_pending()
    }

    /// Backend of the live handle, if connected.
    pub fn backend(&self) -> Option<BackendDescriptor> {
        self.active
            .borrow()
            .as_ref()
            .map(|active| active.handle.descriptor())
    }

    /// Call `observer` with every new snapshot the store publishes.
    pub fn watch(&self, observer: impl Fn(SessionState) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    /// Open the wallet-selection flow and connect the chosen backend.
    pub async fn connect(&self) -> Result<SessionState, SessionError> {
        match self.phase.get() {
            SessionPhase::Idle => {}
            SessionPhase::Connecting | SessionPhase::Disconnecting => {
                return Err(SessionError::Busy)
            }
            SessionPhase::Terminated => return Err(SessionError::Terminated),
            phase @ SessionPhase::Connected => {
                return Err(SessionError::InvalidState {
                    operation: "connect",
                    phase: phase.name(),
                })
            }
        }
        self.phase.set(SessionPhase::Connecting);

        let result = match self.source.select().await {
            Ok(handle) => self.establish(handle).await,
            Err(err) => Err(err),
        };

        result.inspect_err(|err| {
            self.phase.set(SessionPhase::Idle);
            match err {
                SessionError::InvariantViolation(_) => crate::log_error!("connect: {}", err),
                _ => crate::log_warn!("connect did not complete: {}", err),
            }
        })
    }

    /// Silently reconnect the cached backend. Runs at most once per manager;
    /// later calls return `Ok(None)` without touching the provider source.
    ///
    /// A failed restore is not an error: the cache is cleared and the session
    /// stays disconnected.
    pub async fn auto_restore(&self) -> Result<Option<SessionState>, SessionError> {
        if self.restore_attempted.replace(true) {
            crate::log_debug!("auto restore already attempted");
            return Ok(None);
        }
        if !self.config.auto_load {
            crate::log_debug!("auto restore disabled");
            return Ok(None);
        }
        if self.phase.get() != SessionPhase::Idle {
            crate::log_debug!("skipping auto restore while {}", self.phase.get());
            return Ok(None);
        }
        if !self.source.has_cached_backend() {
            return Ok(None);
        }

        self.phase.set(SessionPhase::Connecting);
        let result = match self.source.restore_cached().await {
            Ok(handle) => self.establish(handle).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_fatal() => {
                self.phase.set(SessionPhase::Idle);
                crate::log_error!("auto restore: {}", err);
                Err(err)
            }
            Err(err) => {
                self.source.clear_cache();
                self.phase.set(SessionPhase::Idle);
                crate::log_info!("cached wallet not restored, starting disconnected: {}", err);
                Ok(None)
            }
        }
    }

    /// Tear the live session down, forget the cached backend and reload.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        match self.phase.get() {
            SessionPhase::Connected => {}
            SessionPhase::Connecting | SessionPhase::Disconnecting => {
                return Err(SessionError::Busy)
            }
            SessionPhase::Terminated => return Err(SessionError::Terminated),
            phase @ SessionPhase::Idle => {
                return Err(SessionError::InvalidState {
                    operation: "disconnect",
                    phase: phase.name(),
                })
            }
        }

        let active = self.active.borrow_mut().take();
        let Some(ActiveSession { handle, bridge }) = active else {
            return Err(SessionError::InvariantViolation(
                "connected without a live handle".to_string(),
            ));
        };
        bridge.detach(handle.as_ref());
        self.phase.set(SessionPhase::Disconnecting);

        if let Err(err) = handle.close().await {
            crate::log_warn!("closing {} failed: {}", handle.descriptor(), err);
        }
        drop(handle);

        self.source.clear_cache();
        let state = self.store.borrow_mut().reset();
        self.publish(state);

        self.reloader.reload(ReloadReason::UserDisconnected);
        self.phase.set(SessionPhase::Idle);
        crate::log_info!("wallet disconnected");
        Ok(())
    }

    /// Handle every bridge message already queued. Returns how many were
    /// consumed.
    pub fn process_events(&self) -> usize {
        let mut pending = Vec::new();
        if let Some(rx) = self.events_rx.borrow_mut().as_mut() {
            while let Ok(Some(message)) = rx.try_next() {
                pending.push(message);
            }
        }

        let count = pending.len();
        for message in pending {
            self.handle_message(message);
        }
        count
    }

    /// Consume bridge messages as they arrive until the session is terminated.
    pub async fn run_events(&self) {
        let taken = self.events_rx.borrow_mut().take();
        let Some(mut rx) = taken else {
            crate::log_warn!("session event loop is already running");
            return;
        };

        while let Some(message) = rx.next().await {
            self.handle_message(message);
            if self.phase.get() == SessionPhase::Terminated {
                break;
            }
        }

        *self.events_rx.borrow_mut() = Some(rx);
    }

    /// Query the handle, publish the connected state, attach the bridge and
    /// remember the backend. On failure the handle is closed and nothing is
    /// published or persisted.
    async fn establish(
        &self,
        handle: Box<dyn ConnectionHandle>,
    ) -> Result<SessionState, SessionError> {
        let queried = async {
            let address = handle.get_address().await?;
            if address.is_zero() {
                return Err(SessionError::HandshakeFailed(
                    "wallet reported the zero address".to_string(),
                ));
            }
            let chain_id = handle.get_chain_id().await?;
            Ok::<_, SessionError>((address, chain_id))
        }
        .await;

        let (address, chain_id) = match queried {
            Ok(pair) => pair,
            Err(err) => {
                if let Err(close_err) = handle.close().await {
                    crate::log_debug!("closing failed handle: {}", close_err);
                }
                return Err(err.into_handshake());
            }
        };

        let descriptor = handle.descriptor();
        let state = self.install(handle, SessionAction::Connected { address, chain_id })?;

        if self.config.cache_provider {
            if let Err(err) = self.source.remember(&descriptor) {
                crate::log_warn!("could not cache wallet backend {}: {}", descriptor, err);
            }
        }

        crate::log_info!(
            "wallet {} connected via {} on {}",
            address.short(),
            descriptor,
            describe_chain(chain_id)
        );
        Ok(state)
    }

    fn install(
        &self,
        handle: Box<dyn ConnectionHandle>,
        action: SessionAction,
    ) -> Result<SessionState, SessionError> {
        if self.active.borrow().is_some() {
            return Err(SessionError::InvariantViolation(
                "a connection handle is already live".to_string(),
            ));
        }

        let state = self.store.borrow_mut().dispatch(action)?;

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let bridge = EventBridge::attach(handle.as_ref(), generation, self.events_tx.clone());
        *self.active.borrow_mut() = Some(ActiveSession { handle, bridge });
        self.phase.set(SessionPhase::Connected);

        self.publish(state);
        Ok(state)
    }

    fn handle_message(&self, message: BridgeMessage) {
        let live = self
            .active
            .borrow()
            .as_ref()
            .map(|active| active.bridge.generation());
        if live != Some(message.generation) {
            crate::log_debug!(
                "dropping {} event from replaced handle #{}",
                message.event.kind(),
                message.generation
            );
            return;
        }

        match policy(&message.event) {
            BridgeAction::Ignore => {
                crate::log_debug!("ignoring initial {} notification", message.event.kind())
            }
            BridgeAction::Reload(reason) => self.terminate(reason),
            BridgeAction::ClearCacheAndReload(reason) => {
                self.source.clear_cache();
                self.terminate(reason);
            }
        }
    }

    /// End the session for good and hand control to the reloader.
    fn terminate(&self, reason: ReloadReason) {
        let active = self.active.borrow_mut().take();
        if let Some(ActiveSession { handle, bridge }) = active {
            bridge.detach(handle.as_ref());
        }
        self.phase.set(SessionPhase::Terminated);

        let state = self.store.borrow_mut().reset();
        self.publish(state);

        crate::log_warn!("wallet session ended: {}", reason);
        self.reloader.reload(reason);
    }

    fn publish(&self, state: SessionState) {
        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer(state);
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl SessionManager {
    /// Manager for the browser: the injected wallet, `localStorage` and a
    /// full page reload.
    pub fn for_browser(config: SessionConfig) -> Self {
        use crate::provider::{BackendCache, InjectedBackend, ModalProviderSource, PreferredSelector};
        use crate::reload::PageReload;
        use crate::storage::LocalStorage;

        let cache = BackendCache::new(Rc::new(LocalStorage::new()), config.storage_key.clone());
        let selector = PreferredSelector::new(config.preferred_backends.clone());
        let source = ModalProviderSource::new(selector, cache).with_backend(InjectedBackend::new());
        Self::new(config, source, PageReload)
    }
}
